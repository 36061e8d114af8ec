//! Off-chain push notifications.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::NotificationError;

/// Title sent with every analysis notification.
pub const NOTIFICATION_TITLE: &str = "AI analysis complete";

/// JSON body accepted by the notification backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub aadhar_id: String,
    pub title: String,
    pub body: String,
    #[serde(rename = "imageId", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(rename = "imageType", skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
}

impl Notification {
    /// Notification for a verdict recorded on-chain.
    pub fn analysis_complete(identity: &str, item_url: &str, verdict: &str) -> Self {
        Self {
            aadhar_id: identity.to_string(),
            title: NOTIFICATION_TITLE.to_string(),
            body: verdict.to_string(),
            image_id: Some(item_url.to_string()),
            image_type: None,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Posts notifications as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    image_type: Option<String>,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            image_type: None,
        })
    }

    /// Attach `imageType` to every notification that does not set one.
    pub fn with_image_type(mut self, image_type: impl Into<String>) -> Self {
        self.image_type = Some(image_type.into());
        self
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let mut payload = notification.clone();
        if payload.image_type.is_none() {
            payload.image_type = self.image_type.clone();
        }

        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotificationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let ack: Value = resp
            .json()
            .await
            .map_err(|e| NotificationError::InvalidBody(e.to_string()))?;
        tracing::debug!(aadhar_id = %payload.aadhar_id, response = %ack, "notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answers one request with `status` and `body`, handing back what it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                if n == 0 || received.ends_with(b"}") {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&received).into_owned());
        });
        (format!("http://{addr}/fcm/sendNotification/"), rx)
    }

    fn notification() -> Notification {
        Notification::analysis_complete("1234-5678-9012", "ipfs://a", "AI Review:ipfs://a is Safe")
    }

    #[test]
    fn payload_field_names() {
        let json = serde_json::to_value(notification()).unwrap();
        assert_eq!(json["aadhar_id"], "1234-5678-9012");
        assert_eq!(json["title"], NOTIFICATION_TITLE);
        assert_eq!(json["body"], "AI Review:ipfs://a is Safe");
        assert_eq!(json["imageId"], "ipfs://a");
        assert!(json.get("imageType").is_none());
    }

    #[tokio::test]
    async fn delivers_json_post() {
        let (url, received) = serve_once("200 OK", r#"{"success":true}"#).await;
        let notifier = HttpNotifier::new(url, Duration::from_secs(5))
            .unwrap()
            .with_image_type("crop");

        notifier.notify(&notification()).await.unwrap();

        let request = received.await.unwrap();
        assert!(request.starts_with("POST /fcm/sendNotification/"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.contains(r#""imageType":"crop""#));
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let (url, _received) = serve_once("500 Internal Server Error", r#"{"error":"fcm down"}"#).await;
        let notifier = HttpNotifier::new(url, Duration::from_secs(5)).unwrap();

        let err = notifier.notify(&notification()).await.unwrap_err();
        assert!(matches!(err, NotificationError::Status { status: 500, .. }), "got {err}");
    }

    #[tokio::test]
    async fn non_json_success_is_rejected() {
        let (url, _received) = serve_once("200 OK", "ok").await;
        let notifier = HttpNotifier::new(url, Duration::from_secs(5)).unwrap();

        let err = notifier.notify(&notification()).await.unwrap_err();
        assert!(matches!(err, NotificationError::InvalidBody(_)), "got {err}");
    }
}
