//! Data model shared across the pipeline.

use alloy_primitives::{Address, Bytes, B256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A raw EVM log as delivered by `eth_subscribe("logs")` or `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub log_index: Option<U64>,
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    /// Transaction hash as `0x`-hex, empty when the node omitted it.
    pub fn tx_hash_hex(&self) -> String {
        self.transaction_hash
            .map(|h| h.to_string())
            .unwrap_or_default()
    }

    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.map(|n| n.to::<u64>())
    }
}

/// Address + topic filter for the submission event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: B256,
}

impl LogFilter {
    /// Params object for `eth_subscribe("logs", ..)`.
    pub fn subscription_params(&self) -> Value {
        json!({
            "address": self.address,
            "topics": [[self.topic0]],
        })
    }

    /// Params object for `eth_getLogs` over `[from, to]`.
    pub fn range_params(&self, from: u64, to: u64) -> Value {
        json!({
            "address": self.address,
            "topics": [[self.topic0]],
            "fromBlock": format!("{from:#x}"),
            "toBlock": format!("{to:#x}"),
        })
    }
}

/// Decoded `ImageSubmitted` event: one submitter, one or more items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEvent {
    pub submitter: Address,
    /// Never empty; in the order the submitter packed them.
    pub item_urls: Vec<String>,
    pub transaction_hash: String,
    pub block_number: Option<u64>,
}

/// Verdict for one item, alive only while that item is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisVerdict {
    pub item_url: String,
    pub verdict_text: String,
}

/// On-chain registration of a submitter; read-only for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmerRecord {
    pub address: Address,
    /// Off-chain identity used to target notifications.
    pub identity: String,
}

/// A signed write, built fresh for every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub signed_payload: Bytes,
    pub hash: B256,
}

/// Subset of `eth_getTransactionReceipt` the worker relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U64>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status.map(|s| s == U64::from(1)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_log_from_subscription_payload() {
        let log: RawLog = serde_json::from_value(json!({
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": ["0x2176ff554abc6afb8a3baf0448d7ff22c25829c4aee3806c623ed36edb2b2bba"],
            "data": "0x",
            "blockNumber": "0x1234",
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "logIndex": "0x0",
            "removed": false
        }))
        .unwrap();
        assert_eq!(log.block_number_u64(), Some(0x1234));
        assert!(log.tx_hash_hex().ends_with("aa"));
        assert!(!log.removed);
    }

    #[test]
    fn removed_defaults_to_false() {
        let log: RawLog = serde_json::from_value(json!({
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": [],
            "data": "0x"
        }))
        .unwrap();
        assert!(!log.removed);
        assert_eq!(log.tx_hash_hex(), "");
    }

    #[test]
    fn receipt_status() {
        let ok: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "status": "0x1",
            "blockNumber": "0x10",
            "gasUsed": "0x5208"
        }))
        .unwrap();
        assert!(ok.is_success());

        let reverted: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "status": "0x0"
        }))
        .unwrap();
        assert!(!reverted.is_success());
    }

    #[test]
    fn range_filter_is_hex_encoded() {
        let filter = LogFilter {
            address: Address::ZERO,
            topic0: B256::ZERO,
        };
        let params = filter.range_params(16, 255);
        assert_eq!(params["fromBlock"], "0x10");
        assert_eq!(params["toBlock"], "0xff");
    }
}
