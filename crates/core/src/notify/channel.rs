use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{NotificationMessage, NotifyError};

/// A delivery channel for rendered notifications.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name, recorded in the notification log (e.g. "webhook").
    fn name(&self) -> &str;

    /// Where messages go, recorded in the notification log.
    fn recipient(&self) -> &str;

    async fn send(&self, message: &NotificationMessage) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    title: &'a str,
    body: &'a str,
}

/// Posts notifications as JSON to a configured webhook URL.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotifyError::Channel(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn recipient(&self) -> &str {
        &self.url
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookBody {
                title: &message.title,
                body: &message.body,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Channel(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifyError::Channel(format!(
                "Webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_channel_metadata() {
        let channel =
            WebhookChannel::new("https://hooks.example.com/notify".to_string(), 10).unwrap();
        assert_eq!(channel.name(), "webhook");
        assert_eq!(channel.recipient(), "https://hooks.example.com/notify");
    }

    #[tokio::test]
    async fn test_webhook_send_unreachable() {
        // Port 9 on localhost is not listening, the request fails fast
        let channel = WebhookChannel::new("http://127.0.0.1:9/notify".to_string(), 1).unwrap();
        let result = channel
            .send(&NotificationMessage {
                title: "t".to_string(),
                body: "b".to_string(),
            })
            .await;
        assert!(matches!(result, Err(NotifyError::Channel(_))));
    }
}
