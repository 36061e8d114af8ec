//! Transport seam shared by the HTTP and WebSocket clients.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// Last observed state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Reachable, but the last request hit a transient failure.
    Degraded,
    /// The socket is gone.
    Unhealthy,
    /// Nothing sent yet.
    Unknown,
}

/// A connection to one node that can carry JSON-RPC requests.
///
/// Object safe: the worker holds transports as `Arc<dyn RpcTransport>` and
/// goes through [`call_dyn`] for typed results.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Endpoint url, used in logs and error messages.
    fn url(&self) -> &str;

    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// Request id to stamp on the next call. Multiplexed connections must
    /// hand out distinct ids.
    fn next_id(&self) -> u64 {
        1
    }

    /// Typed call on a concrete transport.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError>
    where
        Self: Sized,
    {
        call_dyn(self, method, params).await
    }
}

/// Sends `method` and decodes the result into `T`. Node errors surface as
/// [`TransportError::Rpc`].
pub async fn call_dyn<T: DeserializeOwned>(
    transport: &(impl RpcTransport + ?Sized),
    method: &str,
    params: Vec<Value>,
) -> Result<T, TransportError> {
    let id = transport.next_id();
    let result = transport
        .send(JsonRpcRequest::new(id, method, params))
        .await?
        .into_result()
        .map_err(TransportError::Rpc)?;
    Ok(serde_json::from_value(result)?)
}
