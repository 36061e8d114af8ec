//! Opening live connections to a selected endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use cropchain_rpc_core::{Endpoint, EndpointProbe, RpcTransport, TransportError, TransportKind};
use cropchain_rpc_http::client::{HttpClientConfig, HttpRpcClient};
use cropchain_rpc_ws::{WsClientConfig, WsRpcClient};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::chain::ChainClient;
use crate::error::ChainError;
use crate::types::LogFilter;

/// A live connection to one node.
#[async_trait]
pub trait ChainConnection: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    async fn block_number(&self) -> Result<u64, TransportError>;

    /// Push subscription to matching logs. The receiver ends when the
    /// connection drops. Only streaming endpoints support this.
    async fn subscribe_logs(
        &self,
        filter: &LogFilter,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError>;

    /// Logs matching `filter` in `[from, to]`.
    async fn get_logs(&self, filter: &LogFilter, from: u64, to: u64) -> Result<Vec<Value>, TransportError>;
}

/// Opens [`ChainConnection`]s.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ChainConnection>, TransportError>;
}

/// Connector backed by the WebSocket and HTTP JSON-RPC clients.
#[derive(Debug, Clone, Default)]
pub struct RpcConnector {
    pub ws: WsClientConfig,
    pub http: HttpClientConfig,
}

#[async_trait]
impl ChainConnector for RpcConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ChainConnection>, TransportError> {
        let connection = match endpoint.transport {
            TransportKind::Streaming => {
                let ws = Arc::new(WsRpcClient::connect(endpoint.url.clone(), self.ws.clone()).await?);
                RpcConnection {
                    endpoint: endpoint.clone(),
                    chain: ChainClient::new(ws.clone()),
                    ws: Some(ws),
                }
            }
            TransportKind::RequestResponse => {
                let http = HttpRpcClient::new(endpoint.url.clone(), self.http.clone())?;
                RpcConnection {
                    endpoint: endpoint.clone(),
                    chain: ChainClient::new(Arc::new(http)),
                    ws: None,
                }
            }
        };
        Ok(Box::new(connection))
    }
}

#[async_trait]
impl EndpointProbe for RpcConnector {
    async fn probe(&self, endpoint: &Endpoint) -> Result<u64, TransportError> {
        self.connect(endpoint).await?.block_number().await
    }
}

struct RpcConnection {
    endpoint: Endpoint,
    chain: ChainClient,
    ws: Option<Arc<WsRpcClient>>,
}

#[async_trait]
impl ChainConnection for RpcConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn block_number(&self) -> Result<u64, TransportError> {
        self.chain.block_number().await.map_err(into_transport)
    }

    async fn subscribe_logs(
        &self,
        filter: &LogFilter,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError> {
        let ws = self.ws.as_ref().ok_or_else(|| {
            TransportError::Other(format!("{} does not support subscriptions", self.endpoint))
        })?;
        let (id, rx) = ws.subscribe("logs", vec![filter.subscription_params()]).await?;
        tracing::info!(endpoint = %self.endpoint.name, subscription = %id, "subscribed to ImageSubmitted logs");
        Ok(rx)
    }

    async fn get_logs(&self, filter: &LogFilter, from: u64, to: u64) -> Result<Vec<Value>, TransportError> {
        self.chain.get_logs(filter, from, to).await.map_err(into_transport)
    }
}

fn into_transport(e: ChainError) -> TransportError {
    match e {
        ChainError::Transport(t) => t,
        other => TransportError::Other(other.to_string()),
    }
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("endpoint", &self.endpoint)
            .field("streaming", &self.ws.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_streaming_endpoint_fails_probe() {
        let endpoint = Endpoint::from_url("wss_1", "ws://127.0.0.1:1").unwrap();
        let err = RpcConnector::default().probe(&endpoint).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn http_connection_cannot_subscribe() {
        let endpoint = Endpoint::from_url("http_1", "http://127.0.0.1:1").unwrap();
        let connection = RpcConnector::default().connect(&endpoint).await.unwrap();
        let filter = LogFilter {
            address: alloy_primitives::Address::ZERO,
            topic0: alloy_primitives::B256::ZERO,
        };
        let err = connection.subscribe_logs(&filter).await.unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
    }
}
