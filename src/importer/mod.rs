mod summary;

pub use summary::{FailedRoute, ImportSummary};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, error, info, trace, warn};
use thiserror::Error;
use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval_at, MissedTickBehavior};

use crate::asn::{AsnResolver, NameService};
use crate::config::ImportConfig;
use crate::db::{Store, StoreError, Upsert};
use crate::paths::{
    AddressFamily, CanonicalRoute, IxpTable, Normalizer, ParseError, PathParser,
};
use crate::source::{api, RouteSource, SourceError};
use crate::utils::format_elapsed_time;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

type TaskOutcome = (CanonicalRoute, Result<Upsert, StoreError>);

/// Loads the route table of one address family into the store
pub struct Importer {
    config: ImportConfig,
    source: Arc<dyn RouteSource>,
    store: Arc<dyn Store>,
    resolver: Arc<AsnResolver>,
    ixps: IxpTable,
}

impl Importer {
    pub fn new(
        config: ImportConfig,
        source: Arc<dyn RouteSource>,
        store: Arc<dyn Store>,
        names: Arc<dyn NameService>,
    ) -> Self {
        let resolver = Arc::new(AsnResolver::new(
            config.local_asn,
            &config.local_as_name,
            Arc::clone(&store),
            names,
        ));
        let ixps = IxpTable::new(&config.ix_ranges);
        Self {
            config,
            source,
            store,
            resolver,
            ixps,
        }
    }

    pub fn resolver(&self) -> &AsnResolver {
        &self.resolver
    }

    fn normalize(&self, destination: &api::Destination) -> Result<CanonicalRoute, ParseError> {
        let normalizer = Normalizer {
            local_asn: self.config.local_asn,
            local_networks: &self.config.local_networks,
            ixps: &self.ixps,
        };
        let parser = PathParser::new(destination)?;
        normalizer.normalize(parser.fields())
    }

    /// Import every route of `family`.
    ///
    /// Upserts run concurrently up to the configured limit. A failed upsert is
    /// recorded in the summary and doesn't stop the run. Source errors do, once
    /// the upserts already dispatched have finished.
    pub async fn import(&self, family: AddressFamily) -> Result<ImportSummary, ImportError> {
        let started = Instant::now();
        let last_seen = Utc::now();
        let mut summary = ImportSummary::new(family);
        info!("Importing {} paths from route source", family.unicast());
        let mut paths = self.source.list_paths(family.unicast()).await?;

        let limit = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        let mut last_report = Instant::now();
        let mut source_error: Option<SourceError> = None;

        while let Some(destination) = paths.next().await {
            let destination = match destination {
                Ok(destination) => destination,
                Err(err) => {
                    error!("Route source failed mid-import: {}", err);
                    source_error = Some(err);
                    break;
                }
            };
            let route = match self.normalize(&destination) {
                Ok(route) => route,
                Err(err) => {
                    warn!("Skipping path: {}", err);
                    summary.invalid += 1;
                    continue;
                }
            };
            if route.is_blacklisted(&self.config.blacklist) {
                debug!("Skipping blacklisted prefix {}", route.prefix);
                summary.blacklisted += 1;
                continue;
            }
            debug!("{}", route);

            let permit = match Arc::clone(&limit).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            while let Some(outcome) = tasks.try_join_next() {
                summary.record(outcome);
            }
            let store = Arc::clone(&self.store);
            let resolver = Arc::clone(&self.resolver);
            tasks.spawn(async move {
                let result = upsert_route(&resolver, store.as_ref(), &route, last_seen).await;
                drop(permit);
                (route, result)
            });

            if last_report.elapsed() >= self.config.status_interval {
                report(tasks.len(), &summary);
                last_report = Instant::now();
            }
        }

        let period = self.config.status_interval;
        let mut status = interval_at(tokio::time::Instant::now() + period, period);
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                outcome = tasks.join_next() => match outcome {
                    Some(outcome) => summary.record(outcome),
                    None => break,
                },
                _ = status.tick() => report(tasks.len(), &summary),
            }
        }

        for failed in &summary.failed {
            warn!("Failed to import {}: {}", failed.route, failed.error);
        }
        if let Some(err) = source_error {
            warn!(
                "Import of {} interrupted after {} paths imported, {} failed",
                family,
                summary.succeeded,
                summary.failed.len()
            );
            return Err(err.into());
        }

        summary.stale = self.store.count_stale(self.config.prefix_timeout).await?;
        summary.elapsed = started.elapsed();
        info!(
            "Imported {} {} paths ({} failed, {} blacklisted, {} invalid) in {}",
            summary.succeeded,
            family,
            summary.failed.len(),
            summary.blacklisted,
            summary.invalid,
            format_elapsed_time(summary.elapsed),
        );
        Ok(summary)
    }
}

fn report(pending: usize, summary: &ImportSummary) {
    info!(
        "Import Status ::: {} paths pending, {} paths imported, {} paths failed",
        pending,
        summary.succeeded,
        summary.failed.len()
    );
}

/// Resolve the source ASN (creating its row), then write the prefix
async fn upsert_route(
    resolver: &AsnResolver,
    store: &dyn Store,
    route: &CanonicalRoute,
    last_seen: DateTime<Utc>,
) -> Result<Upsert, StoreError> {
    let as_name = resolver.resolve(route.source_asn).await?;
    trace!("AS{} is '{}'", route.source_asn, as_name);
    store.upsert_prefix(route, last_seen).await
}
