use std::net::IpAddr;

use ipnetwork::IpNetwork;

pub const NO_IXP: &str = "N/A";

/// Built-in exchange subnets, consulted after any configured entries
const DEFAULT_RANGES: &[(&str, &str)] = &[
    ("SOL-IX STH", "193.110.13.0/24"),
    ("SOL-IX STH", "2001:7F8:21:9::/64"),
    ("SOL-IX STH (MTU 4470)", "2001:7F8:21:10::/64"),
    ("SOL-IX STH (MTU 4470)", "193.110.12.0/24"),
    ("STHIX Stockholm", "2001:7F8:3E:0::/64"),
    ("STHIX Stockholm", "192.121.80.0/24"),
];

/// Exchange point subnet table, split by IP version.
/// Lookup is first-match in insertion order.
#[derive(Clone, Debug, Default)]
pub struct IxpTable {
    v4: Vec<(IpNetwork, String)>,
    v6: Vec<(IpNetwork, String)>,
}

impl IxpTable {
    /// Configured ranges followed by the built-in defaults
    pub fn new(ranges: &[(String, IpNetwork)]) -> Self {
        let mut table = Self::empty();
        for (name, subnet) in ranges {
            table.push(name, *subnet);
        }
        for (name, subnet) in DEFAULT_RANGES {
            // Static entries are known-good
            if let Ok(subnet) = subnet.parse() {
                table.push(name, subnet);
            }
        }
        table
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, subnet: IpNetwork) {
        let entry = (subnet, name.to_string());
        match subnet {
            IpNetwork::V4(_) => self.v4.push(entry),
            IpNetwork::V6(_) => self.v6.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exchange name for the subnet containing `addr`, if any
    pub fn lookup(&self, addr: IpAddr) -> Option<&str> {
        let ranges = match addr {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => &self.v6,
        };
        ranges
            .iter()
            .find(|(subnet, _)| subnet.contains(addr))
            .map(|(_, name)| name.as_str())
    }

    /// Like `lookup`, with "N/A" for no match (or no address)
    pub fn classify(&self, addr: Option<IpAddr>) -> String {
        addr.and_then(|addr| self.lookup(addr))
            .unwrap_or(NO_IXP)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_defaults() {
        let table = IxpTable::new(&[]);
        assert_eq!(table.len(), 6);
        assert_eq!(
            table.classify(Some("193.110.13.40".parse().unwrap())),
            "SOL-IX STH"
        );
        assert_eq!(
            table.classify(Some("2001:7f8:3e::21".parse().unwrap())),
            "STHIX Stockholm"
        );
        assert_eq!(table.classify(Some("8.8.8.8".parse().unwrap())), NO_IXP);
        assert_eq!(table.classify(None), NO_IXP);
    }

    #[test]
    fn test_configured_ranges_first() {
        let ranges = vec![
            ("TEST-IX".to_string(), "203.0.113.0/24".parse().unwrap()),
            ("OVERRIDE".to_string(), "193.110.13.0/25".parse().unwrap()),
        ];
        let table = IxpTable::new(&ranges);
        assert_eq!(table.len(), 8);
        assert_eq!(
            table.classify(Some("203.0.113.5".parse().unwrap())),
            "TEST-IX"
        );
        assert_eq!(
            table.classify(Some("193.110.13.1".parse().unwrap())),
            "OVERRIDE"
        );
        assert_eq!(
            table.classify(Some("193.110.13.200".parse().unwrap())),
            "SOL-IX STH"
        );
    }

    #[test]
    fn test_version_partition() {
        let mut table = IxpTable::empty();
        table.push("V6-IX", "::/0".parse().unwrap());
        assert!(table.lookup("10.0.0.1".parse().unwrap()).is_none());
        assert_eq!(table.lookup("2001:db8::1".parse().unwrap()), Some("V6-IX"));
    }
}
