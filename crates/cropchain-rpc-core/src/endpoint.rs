//! Configured node access points.

use thiserror::Error;
use url::Url;

/// How an endpoint delivers data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Push-capable (WebSocket); supports `eth_subscribe`.
    Streaming,
    /// Pull-only (HTTP); events must be polled.
    RequestResponse,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::RequestResponse => write!(f, "request-response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme '{scheme}' for endpoint '{name}'")]
    UnsupportedScheme { name: String, scheme: String },
}

/// A blockchain node endpoint. Immutable once configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Configuration label, e.g. `wss_provider_1`.
    pub name: String,
    pub url: String,
    pub transport: TransportKind,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport,
        }
    }

    /// Build an endpoint, inferring the transport from the URL scheme.
    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Result<Self, EndpointError> {
        let name = name.into();
        let url = url.into();
        let parsed = Url::parse(&url).map_err(|e| EndpointError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let transport = match parsed.scheme() {
            "ws" | "wss" => TransportKind::Streaming,
            "http" | "https" => TransportKind::RequestResponse,
            other => {
                return Err(EndpointError::UnsupportedScheme {
                    name,
                    scheme: other.to_string(),
                })
            }
        };
        Ok(Self { name, url, transport })
    }

    pub fn is_streaming(&self) -> bool {
        self.transport == TransportKind::Streaming
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_decides_transport() {
        let ws = Endpoint::from_url("wss_provider_1", "wss://node.example/ws").unwrap();
        assert_eq!(ws.transport, TransportKind::Streaming);
        let http = Endpoint::from_url("http_provider_1", "https://node.example").unwrap();
        assert_eq!(http.transport, TransportKind::RequestResponse);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = Endpoint::from_url("ipc", "file:///tmp/geth.ipc").unwrap_err();
        assert!(matches!(err, EndpointError::UnsupportedScheme { scheme, .. } if scheme == "file"));
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(matches!(
            Endpoint::from_url("bad", "not a url"),
            Err(EndpointError::InvalidUrl { .. })
        ));
    }
}
