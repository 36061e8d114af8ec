//! Wiring: builds every component from a [`WorkerConfig`].

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use cropchain_rpc_core::{Endpoint, ProviderSelector, TransportKind};
use cropchain_rpc_http::{HttpClientConfig, HttpRpcClient};
use tokio::sync::watch;

use crate::analyzer::{Analyzer, StubAnalyzer};
use crate::chain::ChainClient;
use crate::config::WorkerConfig;
use crate::connector::RpcConnector;
use crate::contract::ContractAbi;
use crate::decoder::EventDecoder;
use crate::error::WorkerError;
use crate::notifier::{HttpNotifier, Notifier};
use crate::pipeline::ItemPipeline;
use crate::publisher::{PublisherConfig, ResultPublisher};
use crate::subscription::{SubscriptionConfig, SubscriptionManager, SubscriptionState};
use crate::types::LogFilter;

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully assembled worker.
pub struct Worker {
    manager: SubscriptionManager,
}

impl Worker {
    /// Build with the stub analyzer and the HTTP notifier from `config`.
    pub fn new(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let mut notifier = HttpNotifier::new(&config.notification_url, NOTIFICATION_TIMEOUT)?;
        if let Some(image_type) = &config.notification_image_type {
            notifier = notifier.with_image_type(image_type);
        }
        Self::with_components(config, Arc::new(StubAnalyzer), Arc::new(notifier))
    }

    /// Build with caller-supplied analysis and notification back ends.
    pub fn with_components(
        config: &WorkerConfig,
        analyzer: Arc<dyn Analyzer>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, WorkerError> {
        let contract = Arc::new(ContractAbi::new(config.contract_address, &config.abi_json)?);

        let write_transport = HttpRpcClient::new(&config.write_endpoint, HttpClientConfig::default())?;
        let publisher = ResultPublisher::new(
            ChainClient::new(Arc::new(write_transport)),
            contract.clone(),
            config.signer.clone(),
            notifier,
            PublisherConfig {
                receipt_timeout: config.receipt_timeout,
                receipt_poll: config.receipt_poll,
            },
        );

        let connector = Arc::new(RpcConnector::default());
        let manager = SubscriptionManager::new(
            config.endpoints.clone(),
            ProviderSelector::new(config.probe_timeout),
            connector.clone(),
            connector,
            LogFilter {
                address: contract.address(),
                topic0: contract.submission_topic(),
            },
            EventDecoder::new(&contract),
            ItemPipeline::new(analyzer, Arc::new(publisher)),
            SubscriptionConfig {
                retry: config.retry.clone(),
                poll_interval: config.poll_interval,
            },
        );

        Ok(Self { manager })
    }

    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.manager.state()
    }

    /// Run until a fatal error.
    pub async fn run(&self) -> Result<Infallible, WorkerError> {
        self.manager.start().await
    }
}

/// Probe `endpoints` the way [`Worker::run`] would and return the winner.
pub async fn probe_endpoints(config: &WorkerConfig) -> Result<Endpoint, WorkerError> {
    let selector = ProviderSelector::new(config.probe_timeout);
    let endpoint = selector.select(&config.endpoints, &RpcConnector::default()).await?;
    if endpoint.transport == TransportKind::RequestResponse {
        tracing::warn!(endpoint = %endpoint, "only request-response endpoints are healthy; events will be polled");
    }
    Ok(endpoint)
}
