//! Reliability policies shared by the transports and the subscription layer.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
