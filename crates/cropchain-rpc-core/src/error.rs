//! Failures raised by a transport.

use thiserror::Error;

use crate::request::JsonRpcError;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, non-2xx status, body read failure.
    #[error("http transport: {0}")]
    Http(String),

    #[error("websocket transport: {0}")]
    WebSocket(String),

    /// The node answered with an error object.
    #[error("node rejected request ({}): {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("no answer within {ms}ms")]
    Timeout { ms: u64 },

    /// The socket went away with the request still in flight.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("malformed response: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether sending the same request again could succeed. Node-side
    /// rejections and malformed payloads never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. } | Self::ConnectionClosed(_) => {
                true
            }
            Self::Rpc(_) | Self::Deserialization(_) | Self::Other(_) => false,
        }
    }
}
