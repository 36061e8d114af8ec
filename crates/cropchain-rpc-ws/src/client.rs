//! WebSocket JSON-RPC client with subscription routing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use cropchain_rpc_core::error::TransportError;
use cropchain_rpc_core::request::{JsonRpcRequest, JsonRpcResponse};
use cropchain_rpc_core::transport::{call_dyn, HealthStatus, RpcTransport};

use crate::subscriptions::{SubscriptionId, SubscriptionRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ResponseSender = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;
type PendingMap = Arc<Mutex<HashMap<u64, ResponseSender>>>;

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Bound on the opening handshake.
    pub connect_timeout: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: ResponseSender },
    Close,
}

/// WebSocket JSON-RPC client.
///
/// A background task owns the socket. It never reconnects on its own: when
/// the connection drops, every subscription receiver ends and in-flight
/// requests fail with [`TransportError::ConnectionClosed`].
pub struct WsRpcClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscriptions: SubscriptionRegistry,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
}

impl WsRpcClient {
    /// Open the connection to `url` and start the background task.
    pub async fn connect(
        url: impl Into<String>,
        config: WsClientConfig,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        tracing::info!(url = %url, "connecting via WebSocket");

        let (ws_stream, _) = time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            ms: config.connect_timeout.as_millis() as u64,
        })?
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let subscriptions = SubscriptionRegistry::new();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(ws_task(
            url.clone(),
            ws_stream,
            cmd_rx,
            subscriptions.clone(),
            connected.clone(),
        ));

        Ok(Self {
            url,
            cmd_tx,
            subscriptions,
            next_id: AtomicU64::new(1),
            connected,
        })
    }

    /// Subscribe to a WebSocket event stream.
    ///
    /// `kind` is the subscription type (e.g. `"newHeads"`, `"logs"`). The
    /// receiver ends when the connection is lost.
    pub async fn subscribe(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<(SubscriptionId, mpsc::UnboundedReceiver<Value>), TransportError> {
        // eth_subscribe returns the subscription ID as the result
        let id_val: String = call_dyn(
            self,
            "eth_subscribe",
            std::iter::once(Value::String(kind.to_string()))
                .chain(params)
                .collect(),
        )
        .await?;
        let sub_id = SubscriptionId(id_val);
        let rx = self.subscriptions.register(sub_id.clone());
        tracing::debug!(subscription = %sub_id, kind, "subscribed");
        Ok((sub_id, rx))
    }

    /// Returns `false` once the socket has closed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::ConnectionClosed("WS task closed".into()))?;
        rx.await
            .map_err(|_| TransportError::ConnectionClosed("WS response dropped".into()))?
    }

    fn health(&self) -> HealthStatus {
        if self.is_connected() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Background task that owns the WebSocket connection until it closes.
async fn ws_task(
    url: String,
    ws_stream: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    subscriptions: SubscriptionRegistry,
    connected: Arc<AtomicBool>,
) {
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (mut sink, mut stream) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        break "closed by client".to_string();
                    }
                    Some(WsCommand::Send { req, tx }) => {
                        let Some(id) = req.id.as_number() else {
                            let _ = tx.send(Err(TransportError::Other(
                                "WS requests need a numeric id".into(),
                            )));
                            continue;
                        };
                        let msg = match serde_json::to_string(&req) {
                            Ok(msg) => msg,
                            Err(e) => {
                                let _ = tx.send(Err(TransportError::Deserialization(e)));
                                continue;
                            }
                        };
                        lock_pending(&pending).insert(id, tx);
                        if let Err(e) = sink.send(Message::Text(msg.into())).await {
                            break format!("send failed: {e}");
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break "stream ended".to_string(),
                    Some(Err(e)) => break format!("receive error: {e}"),
                    Some(Ok(Message::Text(text))) => {
                        handle_message(text.as_str(), &pending, &subscriptions);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => break "closed by server".to_string(),
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    connected.store(false, Ordering::Relaxed);
    tracing::warn!(url = %url, reason = %reason, "WS connection ended");

    for (_, tx) in lock_pending(&pending).drain() {
        let _ = tx.send(Err(TransportError::ConnectionClosed(reason.clone())));
    }
    subscriptions.close_all();
}

fn lock_pending(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<u64, ResponseSender>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn handle_message(text: &str, pending: &PendingMap, subscriptions: &SubscriptionRegistry) {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return;
    };

    // Subscription notification
    if val.get("method").and_then(|m| m.as_str()) == Some("eth_subscription") {
        if let Some(params) = val.get("params") {
            if let Some(id) = params["subscription"].as_str() {
                subscriptions.dispatch(&SubscriptionId(id.to_string()), params["result"].clone());
            }
        }
        return;
    }

    // Regular JSON-RPC response
    match serde_json::from_value::<JsonRpcResponse>(val) {
        Ok(resp) => {
            let Some(id) = resp.id.as_number() else {
                return;
            };
            if let Some(tx) = lock_pending(pending).remove(&id) {
                let _ = tx.send(Ok(resp));
            }
        }
        Err(e) => tracing::debug!(error = %e, "ignoring unrecognised WS message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn notification_is_routed_to_subscription() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let subscriptions = SubscriptionRegistry::new();
        let mut rx = subscriptions.register(SubscriptionId("0xabc".into()));

        let msg = r#"{
            "jsonrpc":"2.0","method":"eth_subscription",
            "params":{"subscription":"0xabc","result":{"transactionHash":"0xdeadbeef"}}
        }"#;
        handle_message(msg, &pending, &subscriptions);

        assert_eq!(rx.try_recv().unwrap()["transactionHash"], "0xdeadbeef");
    }

    #[test]
    fn response_completes_pending_request() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = oneshot::channel();
        pending.lock().unwrap().insert(7, tx);

        handle_message(
            r#"{"jsonrpc":"2.0","id":7,"result":"0x10"}"#,
            &pending,
            &SubscriptionRegistry::new(),
        );

        let resp = rx.try_recv().unwrap().unwrap();
        assert_eq!(resp.into_result().unwrap(), Value::String("0x10".into()));
        assert!(pending.lock().unwrap().is_empty());
    }

    /// One-shot node: answers `eth_subscribe`, pushes a single log, then
    /// drops the connection.
    async fn spawn_flaky_node() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let req: Value = serde_json::from_str(text.as_str()).unwrap();
                    let reply = serde_json::json!({"jsonrpc":"2.0","id":req["id"],"result":"0xsub"});
                    ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                    let note = serde_json::json!({
                        "jsonrpc":"2.0","method":"eth_subscription",
                        "params":{"subscription":"0xsub","result":{"logIndex":"0x0"}}
                    });
                    ws.send(Message::Text(note.to_string().into())).await.unwrap();
                    break;
                }
            }
            let _ = ws.close(None).await;
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn connection_loss_ends_subscription_stream() {
        let url = spawn_flaky_node().await;
        let client = WsRpcClient::connect(url, WsClientConfig::default())
            .await
            .unwrap();

        let (id, mut rx) = client
            .subscribe("logs", vec![serde_json::json!({})])
            .await
            .unwrap();
        assert_eq!(id, SubscriptionId("0xsub".into()));

        assert_eq!(rx.recv().await.unwrap()["logIndex"], "0x0");
        assert!(rx.recv().await.is_none());
        assert!(!client.is_connected());
        assert_eq!(client.health(), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let err = WsRpcClient::connect("ws://127.0.0.1:1", WsClientConfig::default())
            .await
            .err()
            .unwrap();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}
