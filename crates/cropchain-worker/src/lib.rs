//! cropchain-worker: reacts to `ImageSubmitted` events from the CropChain
//! contract.
//!
//! # Flow
//!
//! ```text
//! node ──logs──▶ SubscriptionManager ──▶ EventDecoder ──▶ ItemPipeline
//!                                                           │ per item, in order
//!                                                           ▼
//!                                              Analyzer ──▶ ResultPublisher
//!                                                           │  AI_solution tx
//!                                                           ▼
//!                                              farmer_map lookup ──▶ Notifier
//! ```
//!
//! Failures are contained at the smallest scope that keeps the worker
//! going: a bad log is skipped, a failed item does not stop its siblings,
//! a lost connection is retried with exponential backoff. Only an empty
//! provider list or an exhausted retry budget stops the worker.

pub mod analyzer;
pub mod chain;
pub mod config;
pub mod connector;
pub mod contract;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod pipeline;
pub mod publisher;
pub mod signer;
pub mod subscription;
pub mod types;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use analyzer::{Analyzer, StubAnalyzer};
pub use chain::ChainClient;
pub use config::{ConfigError, WorkerConfig};
pub use contract::ContractAbi;
pub use decoder::{split_item_urls, EventDecoder, ITEM_DELIMITER};
pub use error::{
    AnalysisError, ChainError, ContractError, DecodeError, ItemError, NotificationError, PublishError,
    WorkerError,
};
pub use logging::{init_tracing, parse_component_level, LogConfig};
pub use notifier::{HttpNotifier, Notification, Notifier};
pub use pipeline::{EventReport, ItemPipeline};
pub use publisher::{PublishReport, Publisher, PublisherConfig, ResultPublisher};
pub use signer::{TransactionSigner, TxParams};
pub use subscription::{SubscriptionConfig, SubscriptionManager, SubscriptionState};
pub use types::{AnalysisVerdict, FarmerRecord, LogFilter, RawLog, SubmissionEvent, Transaction, TransactionReceipt};
pub use worker::{probe_endpoints, Worker};
