//! Long-lived event subscription with provider failover and reconnect
//! backoff.
//!
//! ```text
//! SelectingProvider -> Connecting -> Subscribed | Polling
//!                          ^               |
//!                          |          (connection lost)
//!                          |               v
//!                          +--------- Reconnecting ---(budget spent)--> Failed
//! ```
//!
//! The provider is chosen once. Every connection loss consumes one attempt
//! of the retry budget; the budget is not refilled by a successful session.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use cropchain_rpc_core::{
    Endpoint, EndpointProbe, ProviderSelector, RetryConfig, RetryPolicy, TransportError,
};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time;

use crate::connector::{ChainConnection, ChainConnector};
use crate::decoder::EventDecoder;
use crate::error::WorkerError;
use crate::pipeline::ItemPipeline;
use crate::types::LogFilter;

/// Where the manager currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    SelectingProvider,
    Connecting { attempt: u32 },
    Subscribed { endpoint: String },
    /// Degraded mode: the endpoint cannot push, logs are polled.
    Polling { endpoint: String },
    Reconnecting { attempt: u32, delay: Duration },
    Failed,
}

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub retry: RetryConfig,
    pub poll_interval: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Owns the connection to the selected node and feeds every submission
/// log through the [`ItemPipeline`].
pub struct SubscriptionManager {
    endpoints: Vec<Endpoint>,
    selector: ProviderSelector,
    probe: Arc<dyn EndpointProbe>,
    connector: Arc<dyn ChainConnector>,
    filter: LogFilter,
    decoder: EventDecoder,
    pipeline: ItemPipeline,
    config: SubscriptionConfig,
    state: watch::Sender<SubscriptionState>,
}

impl SubscriptionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoints: Vec<Endpoint>,
        selector: ProviderSelector,
        probe: Arc<dyn EndpointProbe>,
        connector: Arc<dyn ChainConnector>,
        filter: LogFilter,
        decoder: EventDecoder,
        pipeline: ItemPipeline,
        config: SubscriptionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::SelectingProvider);
        Self {
            endpoints,
            selector,
            probe,
            connector,
            filter,
            decoder,
            pipeline,
            config,
            state,
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SubscriptionState) {
        tracing::debug!(state = ?state, "subscription state");
        self.state.send_replace(state);
    }

    /// Select a provider and process events until a fatal failure.
    ///
    /// Returns only with [`WorkerError::NoHealthyProvider`] or, once the
    /// retry budget is spent, [`WorkerError::ConnectionLost`].
    pub async fn start(&self) -> Result<Infallible, WorkerError> {
        self.set_state(SubscriptionState::SelectingProvider);
        let endpoint = match self.selector.select(&self.endpoints, self.probe.as_ref()).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.set_state(SubscriptionState::Failed);
                return Err(e.into());
            }
        };
        tracing::info!(endpoint = %endpoint, "provider selected");

        let policy = RetryPolicy::new(self.config.retry.clone());
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.set_state(SubscriptionState::Connecting { attempt });

            let reason = match self.run_session(&endpoint).await {
                Ok(never) => match never {},
                Err(e) => e,
            };

            match policy.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_secs = delay.as_secs_f64(),
                        error = %reason,
                        "connection lost, retrying"
                    );
                    self.set_state(SubscriptionState::Reconnecting { attempt, delay });
                    time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        endpoint = %endpoint.name,
                        attempts = attempt,
                        error = %reason,
                        "retry budget exhausted"
                    );
                    self.set_state(SubscriptionState::Failed);
                    return Err(WorkerError::ConnectionLost {
                        attempts: attempt,
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }

    /// One connection lifetime. Always ends with the error that ended it.
    async fn run_session(&self, endpoint: &Endpoint) -> Result<Infallible, TransportError> {
        let connection = self.connector.connect(endpoint).await?;
        if endpoint.is_streaming() {
            self.stream(connection.as_ref()).await
        } else {
            self.poll(connection.as_ref()).await
        }
    }

    async fn stream(&self, connection: &dyn ChainConnection) -> Result<Infallible, TransportError> {
        let mut logs = connection.subscribe_logs(&self.filter).await?;
        self.set_state(SubscriptionState::Subscribed {
            endpoint: connection.endpoint().name.clone(),
        });
        tracing::info!(topic = %self.filter.topic0, "waiting for ImageSubmitted events");

        while let Some(raw) = logs.recv().await {
            self.handle_log(raw).await;
        }
        Err(TransportError::ConnectionClosed(
            "subscription stream ended".into(),
        ))
    }

    async fn poll(&self, connection: &dyn ChainConnection) -> Result<Infallible, TransportError> {
        let mut next_block = connection.block_number().await? + 1;
        self.set_state(SubscriptionState::Polling {
            endpoint: connection.endpoint().name.clone(),
        });
        tracing::warn!(
            endpoint = %connection.endpoint().name,
            interval_secs = self.config.poll_interval.as_secs(),
            from_block = next_block,
            "no streaming endpoint, polling for logs"
        );

        loop {
            time::sleep(self.config.poll_interval).await;
            let head = connection.block_number().await?;
            if head < next_block {
                continue;
            }
            let logs = connection.get_logs(&self.filter, next_block, head).await?;
            tracing::debug!(from = next_block, to = head, count = logs.len(), "polled logs");
            for raw in logs {
                self.handle_log(raw).await;
            }
            next_block = head + 1;
        }
    }

    async fn handle_log(&self, raw: Value) {
        if raw.get("removed").and_then(Value::as_bool) == Some(true) {
            tracing::debug!(tx_hash = ?raw.get("transactionHash"), "skipping removed log");
            return;
        }
        match self.decoder.decode_value(raw) {
            Ok(event) => {
                let report = self.pipeline.process_event(&event).await;
                tracing::info!(
                    tx_hash = %event.transaction_hash,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "submission processed"
                );
            }
            Err(e) => tracing::warn!(error = %e, "skipping undecodable log"),
        }
    }
}
