//! Ordered provider failover: pick the first endpoint that answers a
//! liveness probe.
//!
//! Streaming endpoints are always probed before request-response ones,
//! because only they can carry a push subscription later. Within each
//! group the configured order is kept.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::endpoint::Endpoint;
use crate::error::TransportError;

/// Liveness check against a single endpoint, e.g. fetching the chain height.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Returns the latest block height on success.
    async fn probe(&self, endpoint: &Endpoint) -> Result<u64, TransportError>;
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no healthy provider among {tried} configured endpoints")]
    NoHealthyProvider { tried: usize },
}

/// Stateless endpoint selector.
#[derive(Debug, Clone)]
pub struct ProviderSelector {
    probe_timeout: Duration,
}

impl ProviderSelector {
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    /// Endpoints in probing order: streaming first, then request-response,
    /// configured order preserved inside each group.
    pub fn probe_order(endpoints: &[Endpoint]) -> Vec<&Endpoint> {
        let mut ordered: Vec<&Endpoint> = endpoints.iter().collect();
        ordered.sort_by_key(|e| !e.is_streaming());
        ordered
    }

    /// Probe endpoints in priority order and return the first healthy one.
    ///
    /// Stops at the first success; later endpoints are never contacted.
    pub async fn select(
        &self,
        endpoints: &[Endpoint],
        probe: &dyn EndpointProbe,
    ) -> Result<Endpoint, SelectError> {
        for endpoint in Self::probe_order(endpoints) {
            tracing::info!(endpoint = %endpoint.name, url = %endpoint.url, "probing provider");
            match tokio::time::timeout(self.probe_timeout, probe.probe(endpoint)).await {
                Ok(Ok(height)) => {
                    tracing::info!(
                        endpoint = %endpoint.name,
                        latest_block = height,
                        "provider is healthy"
                    );
                    return Ok(endpoint.clone());
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint.name, error = %e, "provider probe failed");
                }
                Err(_) => {
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        timeout_ms = self.probe_timeout.as_millis() as u64,
                        "provider probe timed out"
                    );
                }
            }
        }
        Err(SelectError::NoHealthyProvider {
            tried: endpoints.len(),
        })
    }
}
