//! Writes verdicts back to the contract and notifies the submitter.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::chain::ChainClient;
use crate::contract::ContractAbi;
use crate::error::{ChainError, NotificationError, PublishError};
use crate::notifier::{Notification, Notifier};
use crate::signer::{TransactionSigner, TxParams};

/// Outcome of a confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// `false` when the write landed but the notification did not.
    pub notified: bool,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Record `verdict` for `item_url` on-chain, then notify `submitter`.
    async fn publish(
        &self,
        item_url: &str,
        verdict: &str,
        submitter: Address,
    ) -> Result<PublishReport, PublishError>;
}

/// Receipt wait settings.
#[derive(Debug, Clone, Copy)]
pub struct PublisherConfig {
    pub receipt_timeout: Duration,
    pub receipt_poll: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(120),
            receipt_poll: Duration::from_secs(1),
        }
    }
}

/// [`Publisher`] that signs locally and submits over a [`ChainClient`].
pub struct ResultPublisher {
    chain: ChainClient,
    contract: Arc<ContractAbi>,
    signer: TransactionSigner,
    notifier: Arc<dyn Notifier>,
    config: PublisherConfig,
    /// Serializes nonce fetch, signing and submission for the signing address.
    nonce_lock: Mutex<()>,
}

impl ResultPublisher {
    pub fn new(
        chain: ChainClient,
        contract: Arc<ContractAbi>,
        signer: TransactionSigner,
        notifier: Arc<dyn Notifier>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            chain,
            contract,
            signer,
            notifier,
            config,
            nonce_lock: Mutex::new(()),
        }
    }

    async fn submit(&self, item_url: &str, verdict: &str) -> Result<B256, ChainError> {
        let _guard = self.nonce_lock.lock().await;

        let from = self.signer.address();
        let to = self.contract.address();
        let nonce = self.chain.transaction_count(from).await?;
        let input = Bytes::from(self.contract.encode_record_result(item_url, verdict)?);
        let chain_id = self.chain.chain_id().await?;
        let gas_price = self.chain.gas_price().await?;
        let gas_limit = self.chain.estimate_gas(from, to, &input).await?;
        tracing::debug!(nonce, chain_id, gas_price, gas_limit, "signing AI_solution call");

        let tx = self.signer.sign_call(TxParams {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to,
            input,
        })?;
        let hash = self.chain.send_raw_transaction(&tx.signed_payload).await?;
        if hash != tx.hash {
            tracing::warn!(local = %tx.hash, node = %hash, "node reported a different tx hash");
        }
        tracing::info!(tx_hash = %hash, nonce, "result transaction sent");
        Ok(hash)
    }

    async fn notify(&self, item_url: &str, verdict: &str, submitter: Address) -> Result<(), NotificationError> {
        let record = self
            .chain
            .farmer_record(&self.contract, submitter)
            .await
            .map_err(|source| NotificationError::IdentityLookup {
                submitter: submitter.to_string(),
                source,
            })?;
        tracing::debug!(submitter = %submitter, aadhar_id = %record.identity, "resolved farmer identity");

        self.notifier
            .notify(&Notification::analysis_complete(&record.identity, item_url, verdict))
            .await
    }
}

#[async_trait]
impl Publisher for ResultPublisher {
    async fn publish(
        &self,
        item_url: &str,
        verdict: &str,
        submitter: Address,
    ) -> Result<PublishReport, PublishError> {
        if !self.chain.is_connected().await {
            return Err(PublishError::Connectivity {
                url: self.chain.url().to_string(),
            });
        }

        let tx_hash = self.submit(item_url, verdict).await?;
        let receipt = self
            .chain
            .wait_for_receipt(tx_hash, self.config.receipt_timeout, self.config.receipt_poll)
            .await?;
        if !receipt.is_success() {
            return Err(PublishError::Reverted {
                tx_hash: tx_hash.to_string(),
            });
        }

        let block_number = receipt.block_number.map(|n| n.to::<u64>());
        let gas_used = receipt.gas_used.map(|n| n.to::<u64>());
        tracing::info!(
            tx_hash = %tx_hash,
            block_number = ?block_number,
            gas_used = ?gas_used,
            "result confirmed on-chain"
        );

        let notified = match self.notify(item_url, verdict, submitter).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(item_url, submitter = %submitter, error = %e, "notification failed");
                false
            }
        };

        Ok(PublishReport {
            tx_hash,
            block_number,
            gas_used,
            notified,
        })
    }
}
