//! cropchain-rpc-http: HTTP JSON-RPC transport.
//!
//! Used for the request-response endpoints: contract reads, nonce and gas
//! lookups, raw transaction submission, receipt polling, and `eth_getLogs`
//! polling when no streaming endpoint is healthy.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
