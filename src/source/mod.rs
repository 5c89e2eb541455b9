pub mod api;

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use log::debug;
use thiserror::Error;

use crate::paths::Family;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Route source '{endpoint}' is unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },
    #[error("Route stream failed: {0}")]
    Stream(#[from] tonic::Status),
}

pub type PathStream = Pin<Box<dyn Stream<Item = Result<api::Destination, SourceError>> + Send>>;

/// Provider of the full route table for one AFI/SAFI.
/// Each call re-queries the live table.
#[async_trait]
pub trait RouteSource: Send + Sync {
    async fn list_paths(&self, family: Family) -> Result<PathStream, SourceError>;
}

/// GoBGP daemon reachable over gRPC
#[derive(Debug, Clone)]
pub struct GobgpSource {
    endpoint: String,
}

impl GobgpSource {
    /// `endpoint` is "host:port" or a full URI
    pub fn new(endpoint: &str) -> Self {
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn unavailable<E: std::fmt::Display>(&self, err: E) -> SourceError {
        SourceError::Unavailable {
            endpoint: self.endpoint.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl RouteSource for GobgpSource {
    async fn list_paths(&self, family: Family) -> Result<PathStream, SourceError> {
        debug!("Requesting {} paths from {}", family, self.endpoint);
        let mut client = api::GobgpApiClient::connect(self.endpoint.clone())
            .await
            .map_err(|err| self.unavailable(err))?;
        let request = api::ListPathRequest {
            table_type: api::TABLE_TYPE_GLOBAL,
            family: Some(family.into()),
            ..Default::default()
        };
        let stream = client
            .list_path(request)
            .await
            .map_err(|status| self.unavailable(status.message()))?
            .into_inner();
        Ok(stream
            .filter_map(|response| async move {
                match response {
                    Ok(response) => response.destination.map(Ok),
                    Err(status) => Some(Err(SourceError::Stream(status))),
                }
            })
            .boxed())
    }
}

/// In-memory route source for tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use bgp_rs::AFI;
    use ipnetwork::IpNetwork;

    #[derive(Default)]
    pub struct VecSource {
        pub destinations: Vec<api::Destination>,
        /// Emit a stream error after this many destinations
        pub fail_after: Option<usize>,
        pub unavailable: bool,
    }

    impl VecSource {
        pub fn new(destinations: Vec<api::Destination>) -> Self {
            Self {
                destinations,
                ..Default::default()
            }
        }
    }

    fn matches_family(destination: &api::Destination, family: Family) -> bool {
        match destination.prefix.parse::<IpNetwork>() {
            Ok(IpNetwork::V4(_)) => family.afi == AFI::IPV4,
            Ok(IpNetwork::V6(_)) => family.afi == AFI::IPV6,
            Err(_) => true,
        }
    }

    #[async_trait]
    impl RouteSource for VecSource {
        async fn list_paths(&self, family: Family) -> Result<PathStream, SourceError> {
            if self.unavailable {
                return Err(SourceError::Unavailable {
                    endpoint: "test".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            let mut items: Vec<Result<api::Destination, SourceError>> = self
                .destinations
                .iter()
                .filter(|d| matches_family(d, family))
                .cloned()
                .map(Ok)
                .collect();
            if let Some(count) = self.fail_after {
                items.truncate(count);
                items.push(Err(SourceError::Stream(tonic::Status::internal(
                    "stream reset",
                ))));
            }
            Ok(futures::stream::iter(items).boxed())
        }
    }
}
