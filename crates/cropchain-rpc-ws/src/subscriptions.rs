//! WebSocket subscription routing.
//!
//! Tracks active `eth_subscribe` subscriptions and forwards each
//! `eth_subscription` notification to the receiver registered for its id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::mpsc;

/// Notifications kept for an id the caller has not registered yet.
const MAX_EARLY_NOTIFICATIONS: usize = 64;

/// A unique subscription ID returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    senders: HashMap<SubscriptionId, mpsc::UnboundedSender<Value>>,
    // The node may push a notification before the `eth_subscribe` response
    // has been handed back to the caller.
    early: HashMap<SubscriptionId, Vec<Value>>,
    closed: bool,
}

/// Shared routing table between the client handle and its connection task.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a subscription and get the receiver for its notifications.
    ///
    /// Registering after [`close_all`](Self::close_all) still yields any
    /// buffered notifications, followed by end-of-stream.
    pub fn register(&self, id: SubscriptionId) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        for message in inner.early.remove(&id).unwrap_or_default() {
            let _ = tx.send(message);
        }
        if !inner.closed {
            inner.senders.insert(id, tx);
        }
        rx
    }

    /// Forward an incoming notification to the correct subscription.
    pub fn dispatch(&self, id: &SubscriptionId, message: Value) {
        let mut inner = self.lock();
        if let Some(sender) = inner.senders.get(id) {
            if sender.send(message).is_err() {
                // Receiver dropped; nobody is listening any more.
                inner.senders.remove(id);
            }
            return;
        }
        let early = inner.early.entry(id.clone()).or_default();
        if early.len() < MAX_EARLY_NOTIFICATIONS {
            early.push(message);
        }
    }

    /// Drop every subscription so their receivers observe end-of-stream.
    pub fn close_all(&self) {
        let mut inner = self.lock();
        inner.senders.clear();
        inner.closed = true;
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.lock().senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_dispatch() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriptionId("0xdeadbeef".into());
        let mut rx = registry.register(id.clone());

        registry.dispatch(&id, serde_json::json!({"blockNumber": "0x1"}));

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg["blockNumber"], "0x1");
    }

    #[test]
    fn notifications_before_register_are_delivered() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriptionId("0xa".into());
        registry.dispatch(&id, serde_json::json!(1));
        registry.dispatch(&id, serde_json::json!(2));

        let mut rx = registry.register(id);
        assert_eq!(rx.try_recv().unwrap(), serde_json::json!(1));
        assert_eq!(rx.try_recv().unwrap(), serde_json::json!(2));
    }

    #[test]
    fn dropped_receiver_is_forgotten() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriptionId("0x1".into());
        let rx = registry.register(id.clone());
        assert_eq!(registry.active(), 1);
        drop(rx);
        registry.dispatch(&id, serde_json::json!("log"));
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn close_all_ends_receivers() {
        let registry = SubscriptionRegistry::new();
        let mut rx = registry.register(SubscriptionId("0xb".into()));
        registry.close_all();
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn late_register_after_close_drains_then_ends() {
        let registry = SubscriptionRegistry::new();
        let id = SubscriptionId("0xc".into());
        registry.dispatch(&id, serde_json::json!("log"));
        registry.close_all();

        let mut rx = registry.register(id);
        assert_eq!(rx.try_recv().unwrap(), serde_json::json!("log"));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(registry.active(), 0);
    }
}
