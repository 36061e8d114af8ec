//! Error taxonomy for the worker.
//!
//! Each layer returns its own kind so callers can decide between retrying,
//! skipping and aborting without inspecting strings:
//!
//! | Error | Scope | Handling |
//! |---|---|---|
//! | [`WorkerError::NoHealthyProvider`] | startup | fatal |
//! | [`WorkerError::ConnectionLost`] | subscription | retried with backoff, fatal when the budget is spent |
//! | [`DecodeError`] | one log | logged, log skipped |
//! | [`ItemError`] | one item | logged, next item processed |
//! | [`NotificationError`] | one notification | logged, write-back stays committed |

use cropchain_rpc_core::{SelectError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// A log could not be turned into a submission event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopics,

    #[error("log topic {found} is not ImageSubmitted ({expected})")]
    UnknownTopic { expected: String, found: String },

    #[error("malformed log: {0}")]
    Malformed(String),

    #[error("ABI decode failed: {0}")]
    Abi(String),

    #[error("event in tx {tx_hash} carries no item urls")]
    EmptyPayload { tx_hash: String },
}

/// The contract ABI is missing an entry point or a call could not be encoded.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("invalid contract ABI: {0}")]
    InvalidAbi(String),

    #[error("function '{name}' not found in contract ABI")]
    MissingFunction { name: String },

    #[error("failed to encode call to '{function}': {reason}")]
    Encode { function: String, reason: String },

    #[error("failed to decode output of '{function}': {reason}")]
    Decode { function: String, reason: String },
}

/// Failure talking to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("no receipt for {tx_hash} after {waited_ms}ms")]
    ReceiptTimeout { tx_hash: String, waited_ms: u64 },
}

/// The analyzer could not produce a verdict.
#[derive(Debug, Error)]
#[error("analysis of {item_url} failed: {reason}")]
pub struct AnalysisError {
    pub item_url: String,
    pub reason: String,
}

/// The verdict could not be written back.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("not connected to chain at {url}")]
    Connectivity { url: String },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("transaction {tx_hash} failed on-chain")]
    Reverted { tx_hash: String },
}

/// The off-chain notification could not be delivered.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("could not resolve identity for {submitter}: {source}")]
    IdentityLookup {
        submitter: String,
        #[source]
        source: ChainError,
    },

    #[error("notification request failed: {0}")]
    Request(String),

    #[error("notification endpoint answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("notification endpoint returned a non-JSON body: {0}")]
    InvalidBody(String),
}

/// Processing of a single item failed; siblings are unaffected.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Failures that stop the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    NoHealthyProvider(#[from] SelectError),

    #[error("connection lost, gave up after {attempts} attempts: {reason}")]
    ConnectionLost { attempts: u32, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Notifier(#[from] NotificationError),
}
