use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::db::{StoreError, Upsert};
use crate::paths::{AddressFamily, CanonicalRoute};

/// A route whose upsert failed
#[derive(Debug, Clone, Serialize)]
pub struct FailedRoute {
    /// "<prefix>-<first_hop>-<source_asn>"
    pub route: String,
    pub error: String,
}

/// Outcome of importing one address family
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub family: AddressFamily,
    pub succeeded: usize,
    pub failed: Vec<FailedRoute>,
    pub blacklisted: usize,
    /// Records with no usable prefix
    pub invalid: usize,
    /// Imported prefixes per source ASN
    pub as_counts: BTreeMap<u32, usize>,
    /// Stored prefixes past the staleness timeout after this run
    pub stale: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ImportSummary {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            succeeded: 0,
            failed: vec![],
            blacklisted: 0,
            invalid: 0,
            as_counts: BTreeMap::new(),
            stale: 0,
            elapsed: Duration::default(),
        }
    }

    /// Routes that reached the store, successfully or not
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub(super) fn record(
        &mut self,
        outcome: Result<(CanonicalRoute, Result<Upsert, StoreError>), tokio::task::JoinError>,
    ) {
        match outcome {
            Ok((route, Ok(_))) => {
                self.succeeded += 1;
                *self.as_counts.entry(route.source_asn).or_default() += 1;
            }
            Ok((route, Err(err))) => self.failed.push(FailedRoute {
                route: route.id(),
                error: err.to_string(),
            }),
            Err(err) => self.failed.push(FailedRoute {
                route: "unknown".to_string(),
                error: format!("Upsert task failed: {}", err),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_summary() {
        let mut summary = ImportSummary::new(AddressFamily::V6);
        summary.succeeded = 2;
        summary.as_counts.insert(64500, 2);
        summary.failed.push(FailedRoute {
            route: "2001:db8::/32-None-210083".to_string(),
            error: "SQLite error: database is locked".to_string(),
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["family"], "v6");
        assert_eq!(json["succeeded"], 2);
        assert_eq!(json["as_counts"]["64500"], 2);
        assert_eq!(json["failed"][0]["route"], "2001:db8::/32-None-210083");
        assert!(json.get("elapsed").is_none());
        assert_eq!(summary.total(), 3);
    }
}
