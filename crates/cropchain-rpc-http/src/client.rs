//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Transient failures are retried with exponential backoff, but only for
//! methods that are safe to repeat. Submitting a raw transaction is never
//! retried here: the caller decides what a failed write means.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use cropchain_rpc_core::error::TransportError;
use cropchain_rpc_core::policy::{RetryConfig, RetryPolicy};
use cropchain_rpc_core::request::{JsonRpcRequest, JsonRpcResponse};
use cropchain_rpc_core::transport::{HealthStatus, RpcTransport};

/// Methods with side effects on the node; sent exactly once.
const NON_IDEMPOTENT_METHODS: &[&str] = &["eth_sendRawTransaction", "eth_sendTransaction"];

const HEALTH_UNKNOWN: u8 = 0;
const HEALTH_OK: u8 = 1;
const HEALTH_DEGRADED: u8 = 2;

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::for_requests(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
    next_id: AtomicU64,
    health: AtomicU8,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
            health: AtomicU8::new(HEALTH_UNKNOWN),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

/// Returns `true` if `method` may be re-sent after a transient failure.
pub fn is_idempotent(method: &str) -> bool {
    !NON_IDEMPOTENT_METHODS.contains(&method)
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let retryable_method = is_idempotent(&req.method);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(resp) => {
                    self.health.store(HEALTH_OK, Ordering::Relaxed);
                    return Ok(resp);
                }
                Err(e) if e.is_retryable() => {
                    self.health.store(HEALTH_DEGRADED, Ordering::Relaxed);
                    let delay = if retryable_method {
                        self.retry.next_delay(attempt)
                    } else {
                        None
                    };
                    match delay {
                        Some(delay) => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                method = %req.method,
                                url = %self.url,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            tracing::debug!(
                                attempt,
                                error = %e,
                                method = %req.method,
                                url = %self.url,
                                "giving up on request"
                            );
                            return Err(e);
                        }
                    }
                }
                // Node-side errors (reverts, bad nonce) are final.
                Err(e) => return Err(e),
            }
        }
    }

    fn health(&self) -> HealthStatus {
        match self.health.load(Ordering::Relaxed) {
            HEALTH_OK => HealthStatus::Healthy,
            HEALTH_DEGRADED => HealthStatus::Degraded,
            _ => HealthStatus::Unknown,
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropchain_rpc_core::RetryConfig;

    #[test]
    fn raw_transactions_are_not_idempotent() {
        assert!(!is_idempotent("eth_sendRawTransaction"));
        assert!(is_idempotent("eth_getTransactionReceipt"));
        assert!(is_idempotent("eth_call"));
    }

    #[test]
    fn ids_increase() {
        let client = HttpRpcClient::default_for("http://127.0.0.1:1").unwrap();
        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);
        assert_eq!(client.health(), HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_http_error() {
        // Port 1 on loopback refuses connections immediately.
        let client = HttpRpcClient::new(
            "http://127.0.0.1:1",
            HttpClientConfig {
                retry: RetryConfig::no_retry(),
                request_timeout: Duration::from_secs(2),
            },
        )
        .unwrap();
        let err = client
            .send(JsonRpcRequest::new(1, "eth_blockNumber", vec![]))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
        assert_eq!(client.health(), HealthStatus::Degraded);
    }
}
