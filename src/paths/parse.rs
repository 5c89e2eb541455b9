use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};
use ipnetwork::IpNetwork;
use log::warn;
use thiserror::Error;

use super::attributes::{Attribute, DecodeError, Registry};
use crate::source::api;

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("{0} attribute not found")]
    Missing(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Invalid prefix: {0}")]
    Prefix(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Destination '{0}' has no paths")]
    NoPaths(String),
    #[error("Destination '{destination}' has no usable prefix: {source}")]
    Prefix {
        destination: String,
        #[source]
        source: FieldError,
    },
}

/// Field set extracted from one route record.
/// Every field has already been guarded and defaulted.
#[derive(Debug, Clone)]
pub struct ParsedPath {
    pub destination: String,
    pub prefix: Option<IpNetwork>,
    /// `None` when the AS path attribute was present but undecodable
    pub asn_path: Option<Vec<u32>>,
    pub communities: Vec<u32>,
    pub next_hops: Vec<IpAddr>,
    pub neighbor: Option<IpAddr>,
    pub age: Option<DateTime<Utc>>,
    pub source_id: String,
}

/// Reads fields from the first (best) path of a destination
pub struct PathParser<'a> {
    destination: &'a api::Destination,
    path: &'a api::Path,
    registry: Registry<'static>,
}

impl<'a> PathParser<'a> {
    pub fn new(destination: &'a api::Destination) -> Result<Self, ParseError> {
        let path = destination
            .paths
            .first()
            .ok_or_else(|| ParseError::NoPaths(destination.prefix.clone()))?;
        Ok(Self {
            destination,
            path,
            registry: Registry::standard(),
        })
    }

    fn find(&self, type_name: &'static str) -> Result<Attribute, FieldError> {
        self.registry
            .find(&self.path.pattrs, type_name)?
            .ok_or(FieldError::Missing(type_name))
    }

    /// NLRI prefix with host bits cleared.
    /// Falls back to the destination's prefix string when the path carries no NLRI
    pub fn prefix(&self) -> Result<IpNetwork, FieldError> {
        let network = match &self.path.nlri {
            Some(nlri) => match self.registry.decode(nlri)? {
                Attribute::Prefix { addr, length } => IpNetwork::new(addr, length)
                    .map_err(|err| FieldError::Prefix(format!("{}/{}: {}", addr, length, err)))?,
                _ => return Err(FieldError::Missing("IPAddressPrefix")),
            },
            None => self
                .destination
                .prefix
                .parse::<IpNetwork>()
                .map_err(|err| FieldError::Prefix(format!("{}: {}", self.destination.prefix, err)))?,
        };
        IpNetwork::new(network.network(), network.prefix())
            .map_err(|err| FieldError::Prefix(err.to_string()))
    }

    /// AS numbers of the first path segment, empty if there is no AS path
    pub fn asn_path(&self) -> Result<Vec<u32>, FieldError> {
        match self.find("AsPathAttribute") {
            Ok(Attribute::AsPath(as_path)) => Ok(as_path
                .segments
                .first()
                .map(|segment| match segment {
                    bgp_rs::Segment::AS_SEQUENCE(asns) | bgp_rs::Segment::AS_SET(asns) => {
                        asns.clone()
                    }
                })
                .unwrap_or_default()),
            Ok(_) | Err(FieldError::Missing(_)) => Ok(vec![]),
            Err(err) => Err(err),
        }
    }

    pub fn communities(&self) -> Result<Vec<u32>, FieldError> {
        // Leading dot keeps LargeCommunitiesAttribute from matching
        match self.find(".CommunitiesAttribute") {
            Ok(Attribute::Communities(communities)) => Ok(communities),
            Ok(_) | Err(FieldError::Missing(_)) => Ok(vec![]),
            Err(err) => Err(err),
        }
    }

    /// MP_REACH_NLRI next hops, or the NEXT_HOP attribute if there is none
    pub fn next_hops(&self) -> Result<Vec<IpAddr>, FieldError> {
        match self.find("MpReachNLRIAttribute") {
            Ok(Attribute::MpReachNlri { next_hops }) if !next_hops.is_empty() => {
                return Ok(next_hops)
            }
            Ok(_) | Err(FieldError::Missing(_)) => (),
            Err(err) => return Err(err),
        }
        match self.find("NextHopAttribute")? {
            Attribute::NextHop(next_hop) => Ok(vec![next_hop]),
            _ => Err(FieldError::Missing("NextHopAttribute")),
        }
    }

    pub fn neighbor(&self) -> Option<IpAddr> {
        self.path.neighbor_ip.trim().parse().ok()
    }

    /// Time the path was received (the path's `age` is an epoch timestamp)
    pub fn age(&self) -> Option<DateTime<Utc>> {
        self.path.age.as_ref().and_then(|ts| {
            Utc.timestamp_opt(ts.seconds, ts.nanos.max(0) as u32)
                .single()
        })
    }

    /// Explicit source AS if set, else the first AS path hop, else `local_asn`
    pub fn source_asn(&self, local_asn: u32) -> u32 {
        if self.path.source_asn != 0 {
            return self.path.source_asn;
        }
        self.asn_path()
            .ok()
            .and_then(|path| path.first().copied())
            .unwrap_or(local_asn)
    }

    pub fn source_id(&self) -> &str {
        &self.path.source_id
    }

    /// Extract every field, logging and defaulting the ones that fail to decode
    pub fn fields(&self) -> ParsedPath {
        let destination = &self.destination.prefix;
        let prefix = self
            .prefix()
            .map_err(|err| warn!("[{}] Error decoding prefix: {}", destination, err))
            .ok();
        let asn_path = self
            .asn_path()
            .map_err(|err| warn!("[{}] Error decoding AS path: {}", destination, err))
            .ok();
        let communities = self.communities().unwrap_or_else(|err| {
            warn!("[{}] Error decoding communities: {}", destination, err);
            vec![]
        });
        let next_hops = self.next_hops().unwrap_or_else(|err| {
            warn!("[{}] Error decoding next hops: {}", destination, err);
            vec![]
        });
        ParsedPath {
            destination: destination.clone(),
            prefix,
            asn_path,
            communities,
            next_hops,
            neighbor: self.neighbor(),
            age: self.age(),
            source_id: self.source_id().to_string(),
        }
    }
}
