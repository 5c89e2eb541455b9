use std::convert::From;
use std::fmt;
use std::str::FromStr;

use bgp_rs::{AFI, SAFI};
use ipnetwork::IpNetwork;
use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

use crate::source::api;

/// AFI/SAFI pair as requested from the route source
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Family {
    pub afi: AFI,
    pub safi: SAFI,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.afi, self.safi)
    }
}

impl Family {
    pub fn new(afi: AFI, safi: SAFI) -> Self {
        Self { afi, safi }
    }
}

impl From<Family> for api::Family {
    fn from(family: Family) -> api::Family {
        api::Family {
            afi: family.afi as u16 as i32,
            safi: family.safi as u8 as i32,
        }
    }
}

/// IP version of an import run (and of every route it produces)
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn all() -> [AddressFamily; 2] {
        [AddressFamily::V4, AddressFamily::V6]
    }

    pub fn of(prefix: &IpNetwork) -> Self {
        match prefix {
            IpNetwork::V4(_) => AddressFamily::V4,
            IpNetwork::V6(_) => AddressFamily::V6,
        }
    }

    /// Unicast AFI/SAFI for this IP version
    pub fn unicast(self) -> Family {
        match self {
            AddressFamily::V4 => Family::new(AFI::IPV4, SAFI::Unicast),
            AddressFamily::V6 => Family::new(AFI::IPV6, SAFI::Unicast),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            AddressFamily::V4 => "v4",
            AddressFamily::V6 => "v6",
        };
        write!(f, "{}", display)
    }
}

impl FromStr for AddressFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v4" | "ipv4" | "4" => Ok(AddressFamily::V4),
            "v6" | "ipv6" | "6" => Ok(AddressFamily::V6),
            family => Err(format!("Unsupported address family: '{}'", family)),
        }
    }
}

impl Serialize for AddressFamily {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AddressFamily {
    fn deserialize<D>(deserializer: D) -> Result<AddressFamily, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error, StrDeserializer};
    use serde::de::IntoDeserializer;

    #[test]
    fn test_display_family() {
        assert_eq!(&AddressFamily::V4.unicast().to_string(), "IPv4 Unicast");
        assert_eq!(&AddressFamily::V6.unicast().to_string(), "IPv6 Unicast");
    }

    #[test]
    fn test_family_to_api() {
        let family: api::Family = AddressFamily::V6.unicast().into();
        assert_eq!(family.afi, 2);
        assert_eq!(family.safi, 1);
    }

    #[test]
    fn test_deserialize_address_family() {
        let deserializer: StrDeserializer<Error> = "ipv6".into_deserializer();
        let family = AddressFamily::deserialize(deserializer).unwrap();
        assert_eq!(family, AddressFamily::V6);

        let deserializer: StrDeserializer<Error> = "v4".into_deserializer();
        let family = AddressFamily::deserialize(deserializer).unwrap();
        assert_eq!(family, AddressFamily::V4);

        assert!("l2vpn".parse::<AddressFamily>().is_err());
    }

    #[test]
    fn test_family_of_prefix() {
        let v4: IpNetwork = "10.0.0.0/8".parse().unwrap();
        let v6: IpNetwork = "2001:db8::/32".parse().unwrap();
        assert_eq!(AddressFamily::of(&v4), AddressFamily::V4);
        assert_eq!(AddressFamily::of(&v6), AddressFamily::V6);
    }
}
