mod sqlite;
mod tables;

pub use sqlite::SqliteStore;

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use thiserror::Error;

use crate::paths::CanonicalRoute;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Database pool is closed")]
    PoolClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsnRecord {
    pub asn: u32,
    /// Unset until a name lookup succeeds
    pub as_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPrefix {
    pub id: i64,
    pub asn_id: u32,
    pub asn_path: Vec<u32>,
    pub prefix: IpNetwork,
    pub next_hops: Vec<IpAddr>,
    pub neighbor: Option<IpAddr>,
    pub ixp: String,
    pub last_seen: DateTime<Utc>,
    pub age: Option<DateTime<Utc>>,
}

impl StoredPrefix {
    /// A prefix is stale once it's `timeout` older than the newest `last_seen`
    pub fn is_stale(&self, latest: DateTime<Utc>, timeout: Duration) -> bool {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => self.last_seen < latest - timeout,
            Err(_) => false,
        }
    }
}

/// Result of writing one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted(i64),
    Updated(i64),
}

impl Upsert {
    pub fn id(self) -> i64 {
        match self {
            Upsert::Inserted(id) | Upsert::Updated(id) => id,
        }
    }
}

/// Persistent store for ASNs, prefixes and communities.
/// Duplicate inserts of ASN & community rows are no-ops.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_asn(&self, asn: u32) -> Result<Option<AsnRecord>, StoreError>;

    /// Insert an ASN row, keeping the existing row if there is one
    async fn insert_asn(&self, asn: u32, as_name: Option<&str>) -> Result<(), StoreError>;

    async fn set_as_name(&self, asn: u32, as_name: &str) -> Result<(), StoreError>;

    /// Insert or update the prefix row for (`source_asn`, `prefix`) and link its communities.
    /// The ASN row must already exist.
    async fn upsert_prefix(
        &self,
        route: &CanonicalRoute,
        last_seen: DateTime<Utc>,
    ) -> Result<Upsert, StoreError>;

    async fn find_prefix(
        &self,
        asn_id: u32,
        prefix: IpNetwork,
    ) -> Result<Option<StoredPrefix>, StoreError>;

    async fn prefix_communities(&self, prefix_id: i64) -> Result<Vec<u32>, StoreError>;

    async fn count_prefixes(&self) -> Result<usize, StoreError>;

    /// Newest `last_seen` of any prefix
    async fn latest_seen(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn count_stale(&self, timeout: Duration) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_is_stale() {
        let latest = Utc.timestamp_opt(1_600_010_000, 0).unwrap();
        let mut prefix = StoredPrefix {
            id: 1,
            asn_id: 64500,
            asn_path: vec![64500],
            prefix: "203.0.113.0/24".parse().unwrap(),
            next_hops: vec![],
            neighbor: None,
            ixp: "N/A".to_string(),
            last_seen: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            age: None,
        };
        assert!(prefix.is_stale(latest, Duration::from_secs(1800)));
        assert!(!prefix.is_stale(latest, Duration::from_secs(20_000)));
        prefix.last_seen = latest;
        assert!(!prefix.is_stale(latest, Duration::from_secs(0)));
    }
}
