use std::convert::TryFrom;
use std::net::IpAddr;

use bgp_rs::{ASPath, Segment};
use prost::Message;
use prost_types::Any;
use thiserror::Error;

use crate::source::api;

/// AS_SET segment type as carried in `AsSegment.type`
const AS_SET: u32 = 1;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid {schema} payload: {source}")]
    Payload {
        schema: &'static str,
        #[source]
        source: prost::DecodeError,
    },
    #[error("Invalid IP address '{0}'")]
    Address(String),
    #[error("Invalid prefix length {0}")]
    PrefixLength(u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LargeCommunity {
    pub global_admin: u32,
    pub local_data1: u32,
    pub local_data2: u32,
}

/// A decoded route attribute (or NLRI) envelope
#[derive(Debug, Clone)]
pub enum Attribute {
    /// NLRI prefix, host bits are not validated here
    Prefix { addr: IpAddr, length: u8 },
    Origin(u32),
    AsPath(ASPath),
    NextHop(IpAddr),
    MultiExitDisc(u32),
    LocalPref(u32),
    Communities(Vec<u32>),
    LargeCommunities(Vec<LargeCommunity>),
    MpReachNlri { next_hops: Vec<IpAddr> },
    /// Type name with no known schema
    Unknown(String),
}

/// Schema namespaces, in lookup priority order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Namespace {
    /// Top-level API messages (NLRI encodings)
    Core,
    /// Path attribute messages
    Attribute,
}

impl Namespace {
    pub const PRIORITY: [Namespace; 2] = [Namespace::Core, Namespace::Attribute];
}

pub type DecodeFn = fn(&[u8]) -> Result<Attribute, DecodeError>;

pub struct Schema {
    pub namespace: Namespace,
    pub name: &'static str,
    pub decode: DecodeFn,
}

pub static STANDARD_SCHEMAS: &[Schema] = &[
    Schema {
        namespace: Namespace::Core,
        name: "IPAddressPrefix",
        decode: decode_prefix,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "OriginAttribute",
        decode: decode_origin,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "AsPathAttribute",
        decode: decode_as_path,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "NextHopAttribute",
        decode: decode_next_hop,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "MultiExitDiscAttribute",
        decode: decode_med,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "LocalPrefAttribute",
        decode: decode_local_pref,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "CommunitiesAttribute",
        decode: decode_communities,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "LargeCommunitiesAttribute",
        decode: decode_large_communities,
    },
    Schema {
        namespace: Namespace::Attribute,
        name: "MpReachNLRIAttribute",
        decode: decode_mp_reach,
    },
];

/// Set of known schemas, searched namespace by namespace
#[derive(Clone, Copy)]
pub struct Registry<'a> {
    schemas: &'a [Schema],
}

impl Registry<'static> {
    pub fn standard() -> Self {
        Self::new(STANDARD_SCHEMAS)
    }
}

impl<'a> Registry<'a> {
    pub fn new(schemas: &'a [Schema]) -> Self {
        Self { schemas }
    }

    /// Find the schema for a type name, first namespace in priority order wins
    pub fn lookup(&self, name: &str) -> Option<&'a Schema> {
        Namespace::PRIORITY.iter().find_map(|namespace| {
            self.schemas
                .iter()
                .find(|schema| schema.namespace == *namespace && schema.name == name)
        })
    }

    /// Decode an envelope into a typed attribute.
    /// Type names with no schema yield `Attribute::Unknown`
    pub fn decode(&self, envelope: &Any) -> Result<Attribute, DecodeError> {
        let name = type_name(&envelope.type_url);
        match self.lookup(name) {
            Some(schema) => (schema.decode)(&envelope.value),
            None => Ok(Attribute::Unknown(name.to_string())),
        }
    }

    /// Decode the first envelope whose type URL equals or contains `type_name`
    /// (case-insensitive). Unknown schemas are reported as absent.
    pub fn find(&self, envelopes: &[Any], type_name: &str) -> Result<Option<Attribute>, DecodeError> {
        let needle = type_name.trim().to_lowercase();
        let envelope = envelopes.iter().find(|env| {
            let type_url = env.type_url.trim().to_lowercase();
            type_url == needle || type_url.contains(&needle)
        });
        match envelope {
            Some(envelope) => match self.decode(envelope)? {
                Attribute::Unknown(_) => Ok(None),
                attr => Ok(Some(attr)),
            },
            None => Ok(None),
        }
    }
}

/// Extract the message name from a type URL
/// E.g. "type.googleapis.com/gobgpapi.AsPathAttribute" -> "AsPathAttribute"
pub fn type_name(type_url: &str) -> &str {
    type_url.rsplit('.').next().unwrap_or(type_url)
}

fn payload<M: Message + Default>(schema: &'static str, bytes: &[u8]) -> Result<M, DecodeError> {
    M::decode(bytes).map_err(|source| DecodeError::Payload { schema, source })
}

fn parse_addr(addr: &str) -> Result<IpAddr, DecodeError> {
    addr.trim()
        .parse()
        .map_err(|_| DecodeError::Address(addr.to_string()))
}

fn decode_prefix(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let prefix: api::IpAddressPrefix = payload("IPAddressPrefix", bytes)?;
    let length =
        u8::try_from(prefix.prefix_len).map_err(|_| DecodeError::PrefixLength(prefix.prefix_len))?;
    Ok(Attribute::Prefix {
        addr: parse_addr(&prefix.prefix)?,
        length,
    })
}

fn decode_origin(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let origin: api::OriginAttribute = payload("OriginAttribute", bytes)?;
    Ok(Attribute::Origin(origin.origin))
}

fn decode_as_path(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let as_path: api::AsPathAttribute = payload("AsPathAttribute", bytes)?;
    let segments = as_path
        .segments
        .into_iter()
        .map(|segment| match segment.r#type {
            AS_SET => Segment::AS_SET(segment.numbers),
            _ => Segment::AS_SEQUENCE(segment.numbers),
        })
        .collect();
    Ok(Attribute::AsPath(ASPath { segments }))
}

fn decode_next_hop(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let next_hop: api::NextHopAttribute = payload("NextHopAttribute", bytes)?;
    Ok(Attribute::NextHop(parse_addr(&next_hop.next_hop)?))
}

fn decode_med(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let med: api::MultiExitDiscAttribute = payload("MultiExitDiscAttribute", bytes)?;
    Ok(Attribute::MultiExitDisc(med.med))
}

fn decode_local_pref(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let local_pref: api::LocalPrefAttribute = payload("LocalPrefAttribute", bytes)?;
    Ok(Attribute::LocalPref(local_pref.local_pref))
}

fn decode_communities(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let communities: api::CommunitiesAttribute = payload("CommunitiesAttribute", bytes)?;
    Ok(Attribute::Communities(communities.communities))
}

fn decode_large_communities(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let communities: api::LargeCommunitiesAttribute =
        payload("LargeCommunitiesAttribute", bytes)?;
    Ok(Attribute::LargeCommunities(
        communities
            .communities
            .into_iter()
            .map(|c| LargeCommunity {
                global_admin: c.global_admin,
                local_data1: c.local_data1,
                local_data2: c.local_data2,
            })
            .collect(),
    ))
}

fn decode_mp_reach(bytes: &[u8]) -> Result<Attribute, DecodeError> {
    let mp_reach: api::MpReachNlriAttribute = payload("MpReachNLRIAttribute", bytes)?;
    let next_hops = mp_reach
        .next_hops
        .iter()
        .map(|hop| parse_addr(hop))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Attribute::MpReachNlri { next_hops })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::api::to_any;

    fn as_path_any(numbers: Vec<u32>) -> Any {
        to_any(
            &api::AsPathAttribute {
                segments: vec![api::AsSegment { r#type: 2, numbers }],
            },
            "AsPathAttribute",
        )
    }

    #[test]
    fn test_type_name() {
        assert_eq!(
            type_name("type.googleapis.com/gobgpapi.AsPathAttribute"),
            "AsPathAttribute"
        );
        assert_eq!(type_name("NextHopAttribute"), "NextHopAttribute");
    }

    #[test]
    fn test_decode_as_path() {
        let attr = Registry::standard()
            .decode(&as_path_any(vec![64500, 64501]))
            .unwrap();
        match attr {
            Attribute::AsPath(as_path) => match &as_path.segments[0] {
                Segment::AS_SEQUENCE(asns) => assert_eq!(asns, &vec![64500, 64501]),
                _ => panic!("Expected AS_SEQUENCE"),
            },
            other => panic!("Unexpected attribute {:?}", other),
        }
    }

    #[test]
    fn test_decode_prefix() {
        let envelope = to_any(
            &api::IpAddressPrefix {
                prefix_len: 24,
                prefix: "203.0.113.0".to_string(),
            },
            "IPAddressPrefix",
        );
        match Registry::standard().decode(&envelope).unwrap() {
            Attribute::Prefix { addr, length } => {
                assert_eq!(addr, "203.0.113.0".parse::<IpAddr>().unwrap());
                assert_eq!(length, 24);
            }
            other => panic!("Unexpected attribute {:?}", other),
        }
    }

    #[test]
    fn test_decode_prefix_length_overflow() {
        let envelope = to_any(
            &api::IpAddressPrefix {
                prefix_len: 280,
                prefix: "203.0.113.0".to_string(),
            },
            "IPAddressPrefix",
        );
        assert!(matches!(
            Registry::standard().decode(&envelope),
            Err(DecodeError::PrefixLength(280))
        ));
    }

    #[test]
    fn test_decode_unknown() {
        let envelope = Any {
            type_url: api::type_url("AigpAttribute"),
            value: vec![],
        };
        assert!(matches!(
            Registry::standard().decode(&envelope).unwrap(),
            Attribute::Unknown(name) if name == "AigpAttribute"
        ));
    }

    #[test]
    fn test_decode_bad_next_hop() {
        let envelope = to_any(
            &api::NextHopAttribute {
                next_hop: "not-an-ip".to_string(),
            },
            "NextHopAttribute",
        );
        assert!(matches!(
            Registry::standard().decode(&envelope),
            Err(DecodeError::Address(_))
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let envelope = Any {
            type_url: api::type_url("CommunitiesAttribute"),
            value: vec![0x0a, 0x05, 0x01],
        };
        assert!(matches!(
            Registry::standard().decode(&envelope),
            Err(DecodeError::Payload { schema: "CommunitiesAttribute", .. })
        ));
    }

    #[test]
    fn test_find_attribute() {
        let attrs = vec![
            to_any(&api::OriginAttribute { origin: 0 }, "OriginAttribute"),
            as_path_any(vec![100]),
            to_any(
                &api::CommunitiesAttribute {
                    communities: vec![4259840100],
                },
                "CommunitiesAttribute",
            ),
        ];
        let registry = Registry::standard();
        // Qualified & bare names, case-insensitive
        assert!(matches!(
            registry.find(&attrs, "AsPathAttribute").unwrap(),
            Some(Attribute::AsPath(_))
        ));
        assert!(matches!(
            registry.find(&attrs, "communities").unwrap(),
            Some(Attribute::Communities(c)) if c == vec![4259840100]
        ));
        assert!(registry.find(&attrs, "NextHopAttribute").unwrap().is_none());
    }

    #[test]
    fn test_find_unknown_is_absent() {
        let attrs = vec![Any {
            type_url: api::type_url("PmsiTunnelAttribute"),
            value: vec![],
        }];
        assert!(Registry::standard()
            .find(&attrs, "PmsiTunnel")
            .unwrap()
            .is_none());
    }

    fn decode_as_origin(_bytes: &[u8]) -> Result<Attribute, DecodeError> {
        Ok(Attribute::Origin(0))
    }

    static COLLIDING: &[Schema] = &[
        Schema {
            namespace: Namespace::Attribute,
            name: "IPAddressPrefix",
            decode: decode_as_origin,
        },
        Schema {
            namespace: Namespace::Core,
            name: "IPAddressPrefix",
            decode: decode_prefix,
        },
    ];

    #[test]
    fn test_namespace_priority() {
        let registry = Registry::new(COLLIDING);
        let schema = registry.lookup("IPAddressPrefix").unwrap();
        assert_eq!(schema.namespace, Namespace::Core);
        assert!(registry.lookup("AsPathAttribute").is_none());
    }
}
