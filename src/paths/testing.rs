//! Builders for raw route records used across the crate's tests
use ipnetwork::IpNetwork;
use prost_types::{Any, Timestamp};

use crate::paths::AddressFamily;
use crate::source::api::{self, to_any};

pub struct RouteBuilder {
    prefix: String,
    nlri: Option<Any>,
    pattrs: Vec<Any>,
    neighbor: String,
    age: Option<i64>,
    source_asn: u32,
    source_id: String,
}

/// Start a record for a CIDR prefix, e.g. "203.0.113.0/24"
pub fn route(prefix: &str) -> RouteBuilder {
    let mut parts = prefix.splitn(2, '/');
    let addr = parts.next().unwrap_or_default().to_string();
    let length: u32 = parts.next().and_then(|l| l.parse().ok()).unwrap_or(32);
    RouteBuilder {
        prefix: prefix.to_string(),
        nlri: Some(to_any(
            &api::IpAddressPrefix {
                prefix_len: length,
                prefix: addr,
            },
            "IPAddressPrefix",
        )),
        pattrs: vec![to_any(&api::OriginAttribute { origin: 0 }, "OriginAttribute")],
        neighbor: "192.0.2.1".to_string(),
        age: Some(1_600_000_000),
        source_asn: 0,
        source_id: "192.0.2.254".to_string(),
    }
}

impl RouteBuilder {
    pub fn as_path(mut self, numbers: Vec<u32>) -> Self {
        self.pattrs.push(to_any(
            &api::AsPathAttribute {
                segments: vec![api::AsSegment { r#type: 2, numbers }],
            },
            "AsPathAttribute",
        ));
        self
    }

    pub fn next_hop(mut self, next_hop: &str) -> Self {
        self.pattrs.push(to_any(
            &api::NextHopAttribute {
                next_hop: next_hop.to_string(),
            },
            "NextHopAttribute",
        ));
        self
    }

    pub fn mp_reach(mut self, next_hops: &[&str]) -> Self {
        self.pattrs.push(to_any(
            &api::MpReachNlriAttribute {
                family: None,
                next_hops: next_hops.iter().map(|h| h.to_string()).collect(),
                nlris: vec![],
            },
            "MpReachNLRIAttribute",
        ));
        self
    }

    pub fn communities(mut self, communities: Vec<u32>) -> Self {
        self.pattrs.push(to_any(
            &api::CommunitiesAttribute { communities },
            "CommunitiesAttribute",
        ));
        self
    }

    /// Raw attribute envelope, e.g. a corrupt payload
    pub fn attr(mut self, envelope: Any) -> Self {
        self.pattrs.push(envelope);
        self
    }

    pub fn without_nlri(mut self) -> Self {
        self.nlri = None;
        self
    }

    pub fn neighbor(mut self, neighbor: &str) -> Self {
        self.neighbor = neighbor.to_string();
        self
    }

    pub fn age(mut self, seconds: Option<i64>) -> Self {
        self.age = seconds;
        self
    }

    pub fn source_asn(mut self, asn: u32) -> Self {
        self.source_asn = asn;
        self
    }

    pub fn build(self) -> api::Destination {
        let family = self
            .prefix
            .parse::<IpNetwork>()
            .ok()
            .map(|prefix| AddressFamily::of(&prefix).unicast().into());
        let path = api::Path {
            nlri: self.nlri,
            pattrs: self.pattrs,
            age: self.age.map(|seconds| Timestamp { seconds, nanos: 0 }),
            best: true,
            neighbor_ip: self.neighbor,
            source_asn: self.source_asn,
            source_id: self.source_id,
            family,
            ..Default::default()
        };
        api::Destination {
            prefix: self.prefix,
            paths: vec![path],
        }
    }

    pub fn response(self) -> api::ListPathResponse {
        api::ListPathResponse {
            destination: Some(self.build()),
        }
    }
}

/// Envelope whose payload cannot be decoded by its schema
pub fn corrupt(name: &str) -> Any {
    Any {
        type_url: api::type_url(name),
        value: vec![0x0a, 0x05, 0x01],
    }
}
