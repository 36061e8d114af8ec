//! `ImageSubmitted` log decoding.

use alloy_dyn_abi::{DynSolValue, EventExt};
use alloy_json_abi::Event;
use alloy_primitives::B256;
use serde_json::Value;

use crate::contract::ContractAbi;
use crate::error::DecodeError;
use crate::types::{RawLog, SubmissionEvent};

/// Separator between item urls packed into one `imageUrl` field.
pub const ITEM_DELIMITER: &str = "$$$";

/// Split a packed `imageUrl` field into item urls, keeping their order.
///
/// Segments are kept byte for byte, since the verdict is recorded under the
/// url as submitted. Empty segments (`"a$$$$$$b"`, trailing `$$$`) carry no
/// item and are dropped.
pub fn split_item_urls(packed: &str) -> Vec<String> {
    packed
        .split(ITEM_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns raw logs into [`SubmissionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    event: Event,
    topic: B256,
}

impl EventDecoder {
    pub fn new(contract: &ContractAbi) -> Self {
        Self {
            event: contract.submission_event().clone(),
            topic: contract.submission_topic(),
        }
    }

    pub fn topic(&self) -> B256 {
        self.topic
    }

    /// Decode a log payload as delivered by the node.
    pub fn decode_value(&self, raw: Value) -> Result<SubmissionEvent, DecodeError> {
        let log: RawLog =
            serde_json::from_value(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        self.decode(&log)
    }

    pub fn decode(&self, log: &RawLog) -> Result<SubmissionEvent, DecodeError> {
        let topic0 = log.topics.first().ok_or(DecodeError::MissingTopics)?;
        if *topic0 != self.topic {
            return Err(DecodeError::UnknownTopic {
                expected: self.topic.to_string(),
                found: topic0.to_string(),
            });
        }

        let decoded = self
            .event
            .decode_log_parts(log.topics.iter().copied(), &log.data, true)
            .map_err(|e| DecodeError::Abi(e.to_string()))?;

        // Reassemble values in declaration order.
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let values: Vec<DynSolValue> = self
            .event
            .inputs
            .iter()
            .filter_map(|input| if input.indexed { indexed.next() } else { body.next() })
            .collect();

        let submitter = values
            .iter()
            .find_map(|v| match v {
                DynSolValue::Address(a) => Some(*a),
                _ => None,
            })
            .ok_or_else(|| DecodeError::Malformed("no submitter address in event".into()))?;
        let packed = values
            .iter()
            .find_map(|v| v.as_str())
            .ok_or_else(|| DecodeError::Malformed("no imageUrl string in event".into()))?;

        let item_urls = split_item_urls(packed);
        if item_urls.is_empty() {
            return Err(DecodeError::EmptyPayload {
                tx_hash: log.tx_hash_hex(),
            });
        }

        Ok(SubmissionEvent {
            submitter,
            item_urls,
            transaction_hash: log.tx_hash_hex(),
            block_number: log.block_number_u64(),
        })
    }
}
