//! cropchain-rpc-ws: WebSocket JSON-RPC transport.
//!
//! # Features
//! - Request multiplexing over a single connection
//! - `eth_subscribe` notification routing per subscription id
//! - Connection loss is surfaced: subscription receivers end and pending
//!   requests fail, so the owner can apply its own reconnect policy

pub mod client;
pub mod subscriptions;

pub use client::{WsClientConfig, WsRpcClient};
pub use subscriptions::{SubscriptionId, SubscriptionRegistry};
