mod cymru;

pub use cymru::{parse_txt, CymruNameService};

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::db::{Store, StoreError};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Name lookup for AS{asn} failed: {reason}")]
    Query { asn: u32, reason: String },
    #[error("No name found for AS{0}")]
    NotFound(u32),
}

/// External ASN -> name lookup. Best effort, may be slow.
#[async_trait]
pub trait NameService: Send + Sync {
    async fn lookup(&self, asn: u32) -> Result<String, LookupError>;
}

pub fn unknown_name(asn: u32) -> String {
    format!("Unknown ({})", asn)
}

/// Resolves AS names through an in-process cache, the store, then the name service.
///
/// Every resolved ASN has a row in the store when `resolve` returns,
/// so prefix rows can reference it. Concurrent resolves of the same ASN
/// share one load.
pub struct AsnResolver {
    local_asn: u32,
    local_as_name: String,
    store: Arc<dyn Store>,
    names: Arc<dyn NameService>,
    cache: DashMap<u32, Arc<OnceCell<String>>>,
}

impl AsnResolver {
    pub fn new(
        local_asn: u32,
        local_as_name: &str,
        store: Arc<dyn Store>,
        names: Arc<dyn NameService>,
    ) -> Self {
        Self {
            local_asn,
            local_as_name: local_as_name.to_string(),
            store,
            names,
            cache: DashMap::new(),
        }
    }

    /// Name for `asn`. Lookup failures yield "Unknown (<asn>)", only store errors are returned
    pub async fn resolve(&self, asn: u32) -> Result<String, StoreError> {
        // Don't hold the map guard across the await
        let cell = Arc::clone(
            self.cache
                .entry(asn)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );
        let name = cell.get_or_try_init(|| self.load(asn)).await?;
        Ok(name.clone())
    }

    /// Number of ASNs resolved by this instance
    pub fn cached(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    async fn load(&self, asn: u32) -> Result<String, StoreError> {
        if asn == self.local_asn {
            self.store
                .insert_asn(asn, Some(self.local_as_name.as_str()))
                .await?;
            return Ok(self.local_as_name.clone());
        }
        match self.store.find_asn(asn).await? {
            Some(record) => match record.as_name {
                Some(name) => Ok(name),
                None => match self.lookup(asn).await {
                    Some(name) => {
                        self.store.set_as_name(asn, &name).await?;
                        Ok(name)
                    }
                    None => Ok(unknown_name(asn)),
                },
            },
            None => {
                let name = self.lookup(asn).await;
                // Placeholders are never persisted, the next run retries
                self.store.insert_asn(asn, name.as_deref()).await?;
                Ok(name.unwrap_or_else(|| unknown_name(asn)))
            }
        }
    }

    async fn lookup(&self, asn: u32) -> Option<String> {
        match self.names.lookup(asn).await {
            Ok(name) => {
                debug!("Resolved AS{} to '{}'", asn, name);
                Some(name)
            }
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::MapNameService;
    use super::*;
    use crate::db::SqliteStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(dir: &TempDir, names: Arc<MapNameService>) -> (Arc<SqliteStore>, AsnResolver) {
        let store = Arc::new(SqliteStore::open(dir.path().join("asn.sqlite3"), 4).unwrap());
        let resolver = AsnResolver::new(210083, "Privex Inc.", store.clone(), names);
        (store, resolver)
    }

    #[tokio::test]
    async fn test_resolve_local() {
        let dir = TempDir::new().unwrap();
        let names = Arc::new(MapNameService::default());
        let (store, resolver) = setup(&dir, names.clone());
        assert_eq!(resolver.resolve(210083).await.unwrap(), "Privex Inc.");
        assert_eq!(names.queries(), 0);
        assert!(store.find_asn(210083).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resolve_tiers() {
        let dir = TempDir::new().unwrap();
        let names = Arc::new(MapNameService::new(&[(64500, "EXAMPLE-AS")]));
        let (store, resolver) = setup(&dir, names.clone());
        store.insert_asn(64501, Some("STORED-AS")).await.unwrap();

        assert_eq!(resolver.resolve(64501).await.unwrap(), "STORED-AS");
        assert_eq!(names.queries(), 0);

        assert_eq!(resolver.resolve(64500).await.unwrap(), "EXAMPLE-AS");
        assert_eq!(resolver.resolve(64500).await.unwrap(), "EXAMPLE-AS");
        assert_eq!(names.queries(), 1);
        assert_eq!(
            store.find_asn(64500).await.unwrap().unwrap().as_name,
            Some("EXAMPLE-AS".to_string())
        );
        assert_eq!(resolver.cached(), 2);
    }

    #[tokio::test]
    async fn test_lookup_failure() {
        let dir = TempDir::new().unwrap();
        let (store, resolver) = setup(&dir, Arc::new(MapNameService::default()));
        assert_eq!(resolver.resolve(64999).await.unwrap(), "Unknown (64999)");
        assert_eq!(store.find_asn(64999).await.unwrap().unwrap().as_name, None);

        // A later run fills in the name
        let names = Arc::new(MapNameService::new(&[(64999, "LATE-AS")]));
        let resolver = AsnResolver::new(210083, "Privex Inc.", store.clone(), names);
        assert_eq!(resolver.resolve(64999).await.unwrap(), "LATE-AS");
        assert_eq!(
            store.find_asn(64999).await.unwrap().unwrap().as_name,
            Some("LATE-AS".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolve() {
        let dir = TempDir::new().unwrap();
        let names = Arc::new(MapNameService {
            delay: Some(Duration::from_millis(50)),
            ..MapNameService::new(&[(64500, "EXAMPLE-AS")])
        });
        let (store, resolver) = setup(&dir, names.clone());
        let resolver = Arc::new(resolver);
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(64500).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "EXAMPLE-AS");
        }
        assert_eq!(names.queries(), 1);
        assert!(store.find_asn(64500).await.unwrap().is_some());
    }
}
