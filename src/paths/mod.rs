mod attributes;
mod families;
mod ixp;
mod parse;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use itertools::Itertools;

pub use attributes::{
    type_name, Attribute, DecodeError, DecodeFn, LargeCommunity, Namespace, Registry, Schema,
    STANDARD_SCHEMAS,
};
pub use families::{AddressFamily, Family};
pub use ixp::{IxpTable, NO_IXP};
pub use parse::{FieldError, ParseError, ParsedPath, PathParser};

/// Normalized route, the unit written to the store.
/// Derived fields are computed once by `Normalizer::normalize`
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRoute {
    pub prefix: IpNetwork,
    pub family: AddressFamily,
    pub next_hops: Vec<IpAddr>,
    pub asn_path: Vec<u32>,
    pub communities: Vec<u32>,
    pub neighbor: Option<IpAddr>,
    pub source_id: String,
    pub age: Option<DateTime<Utc>>,
    pub source_asn: u32,
    pub ixp: String,
}

impl CanonicalRoute {
    pub fn first_hop(&self) -> Option<IpAddr> {
        self.next_hops.first().copied()
    }

    /// Blacklist entries match by exact network equality
    pub fn is_blacklisted(&self, blacklist: &[IpNetwork]) -> bool {
        blacklist.contains(&self.prefix)
    }

    /// "<prefix>-<first_hop>-<source_asn>", identifies the route in reports
    pub fn id(&self) -> String {
        let first_hop = self
            .first_hop()
            .map(|hop| hop.to_string())
            .unwrap_or_else(|| "None".to_string());
        format!("{}-{}-{}", self.prefix, first_hop, self.source_asn)
    }
}

impl fmt::Display for CanonicalRoute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Prefix: {}, Source ASN: {}, Next Hop: {}, AS Path: [{}]",
            self.prefix,
            self.source_asn,
            self.first_hop()
                .map(|hop| hop.to_string())
                .unwrap_or_else(|| "None".to_string()),
            self.asn_path.iter().join(" "),
        )
    }
}

/// Turns parsed fields into a `CanonicalRoute`
pub struct Normalizer<'a> {
    pub local_asn: u32,
    pub local_networks: &'a [IpNetwork],
    pub ixps: &'a IxpTable,
}

impl<'a> Normalizer<'a> {
    pub fn normalize(&self, parsed: ParsedPath) -> Result<CanonicalRoute, ParseError> {
        let prefix = parsed.prefix.ok_or_else(|| ParseError::Prefix {
            destination: parsed.destination.clone(),
            source: FieldError::Missing("IPAddressPrefix"),
        })?;
        let asn_path = match parsed.asn_path {
            Some(asn_path) => asn_path,
            // Undecodable AS path on one of our own prefixes
            None if self.is_local(&prefix) => vec![self.local_asn],
            None => vec![],
        };
        let source_asn = asn_path.first().copied().unwrap_or(self.local_asn);
        let ixp = self.ixps.classify(parsed.next_hops.first().copied());
        Ok(CanonicalRoute {
            family: AddressFamily::of(&prefix),
            prefix,
            next_hops: parsed.next_hops,
            asn_path,
            communities: parsed.communities,
            neighbor: parsed.neighbor,
            source_id: parsed.source_id,
            age: parsed.age,
            source_asn,
            ixp,
        })
    }

    fn is_local(&self, prefix: &IpNetwork) -> bool {
        self.local_networks
            .iter()
            .any(|net| is_subnet_of(prefix, net))
    }
}

/// True if `inner` lies entirely within `outer`
pub fn is_subnet_of(inner: &IpNetwork, outer: &IpNetwork) -> bool {
    outer.prefix() <= inner.prefix() && outer.contains(inner.network())
}
