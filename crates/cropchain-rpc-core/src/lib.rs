//! cropchain-rpc-core: transport foundation for the CropChain worker.
//!
//! # Overview
//!
//! The worker talks to EVM nodes over two kinds of endpoints: streaming
//! (WebSocket, push subscriptions) and request-response (HTTP). This crate
//! defines what both have in common:
//!
//! - [`RpcTransport`]: the async trait every transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`]: structured error type
//! - [`Endpoint`] / [`TransportKind`]: configured node access points
//! - [`ProviderSelector`]: ordered liveness probing with failover
//! - [`policy`] module: exponential backoff retry

pub mod endpoint;
pub mod error;
pub mod policy;
pub mod request;
pub mod selector;
pub mod transport;

pub use endpoint::{Endpoint, EndpointError, TransportKind};
pub use error::TransportError;
pub use policy::{RetryConfig, RetryPolicy};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use selector::{EndpointProbe, ProviderSelector, SelectError};
pub use transport::{call_dyn, HealthStatus, RpcTransport};
