//! Typed Ethereum JSON-RPC calls on top of any [`RpcTransport`].

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U128, U64};
use cropchain_rpc_core::{call_dyn, RpcTransport, TransportError};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tokio::time::{self, Instant};

use crate::contract::ContractAbi;
use crate::error::ChainError;
use crate::types::{FarmerRecord, LogFilter, TransactionReceipt};

/// Chain access used by the publisher and the subscription manager.
#[derive(Clone)]
pub struct ChainClient {
    transport: Arc<dyn RpcTransport>,
    chain_id: Arc<OnceCell<u64>>,
}

impl ChainClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            chain_id: Arc::new(OnceCell::new()),
        }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, ChainError> {
        call_dyn(self.transport.as_ref(), method, params)
            .await
            .map_err(ChainError::from)
    }

    /// `true` when the node answers `web3_clientVersion`.
    pub async fn is_connected(&self) -> bool {
        match self.request::<Value>("web3_clientVersion", vec![]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url(), error = %e, "connectivity check failed");
                false
            }
        }
    }

    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let n: U64 = self.request("eth_blockNumber", vec![]).await?;
        Ok(n.to())
    }

    /// Chain id, fetched once and cached.
    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id
            .get_or_try_init(|| async {
                let id: U64 = self.request("eth_chainId", vec![]).await?;
                Ok::<_, ChainError>(id.to())
            })
            .await
            .copied()
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        let n: U64 = self
            .request("eth_getTransactionCount", vec![json!(address), json!("pending")])
            .await?;
        Ok(n.to())
    }

    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        let price: U128 = self.request("eth_gasPrice", vec![]).await?;
        Ok(price.to())
    }

    pub async fn estimate_gas(&self, from: Address, to: Address, data: &Bytes) -> Result<u64, ChainError> {
        let gas: U64 = self
            .request(
                "eth_estimateGas",
                vec![json!({ "from": from, "to": to, "data": data })],
            )
            .await?;
        Ok(gas.to())
    }

    /// Read-only `eth_call` against the latest block.
    pub async fn call(&self, to: Address, data: &Bytes) -> Result<Bytes, ChainError> {
        self.request("eth_call", vec![json!({ "to": to, "data": data }), json!("latest")])
            .await
    }

    pub async fn send_raw_transaction(&self, payload: &Bytes) -> Result<B256, ChainError> {
        self.request("eth_sendRawTransaction", vec![json!(payload)]).await
    }

    /// `None` while the transaction is not yet mined.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, ChainError> {
        self.request("eth_getTransactionReceipt", vec![json!(hash)]).await
    }

    /// Poll for the receipt of `hash` every `poll` until `timeout` elapses.
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        timeout: Duration,
        poll: Duration,
    ) -> Result<TransactionReceipt, ChainError> {
        let started = Instant::now();
        loop {
            match self.transaction_receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                // A flaky read while waiting is not a verdict on the transaction.
                Err(ChainError::Transport(e)) if e.is_retryable() => {
                    tracing::debug!(tx_hash = %hash, error = %e, "receipt poll failed");
                }
                Err(e) => return Err(e),
            }

            if started.elapsed() + poll > timeout {
                return Err(ChainError::ReceiptTimeout {
                    tx_hash: hash.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            time::sleep(poll).await;
        }
    }

    /// `eth_getLogs` over the inclusive range `[from, to]`.
    pub async fn get_logs(&self, filter: &LogFilter, from: u64, to: u64) -> Result<Vec<Value>, ChainError> {
        self.request("eth_getLogs", vec![filter.range_params(from, to)])
            .await
    }

    /// Look up the registry entry for `submitter`.
    pub async fn farmer_record(
        &self,
        contract: &ContractAbi,
        submitter: Address,
    ) -> Result<FarmerRecord, ChainError> {
        let calldata = Bytes::from(contract.encode_farmer_lookup(submitter)?);
        let output = self.call(contract.address(), &calldata).await?;
        if output.is_empty() {
            return Err(TransportError::Other(format!(
                "empty farmer_map result for {submitter}"
            ))
            .into());
        }
        Ok(contract.decode_farmer_record(submitter, &output)?)
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("url", &self.url())
            .finish()
    }
}
