use std::sync::Mutex;

use async_trait::async_trait;

use crate::notify::{NotificationChannel, NotificationMessage, NotifyError};

/// Notification channel that records messages instead of delivering them.
pub struct MockNotificationChannel {
    messages: Mutex<Vec<NotificationMessage>>,
    should_fail: bool,
}

impl MockNotificationChannel {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            should_fail: false,
        }
    }

    /// A channel whose every send fails.
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    /// Messages delivered so far, in send order.
    pub fn sent_messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl Default for MockNotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for MockNotificationChannel {
    fn name(&self) -> &str {
        "mock"
    }

    fn recipient(&self) -> &str {
        "mock://test"
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        if self.should_fail {
            return Err(NotifyError::Channel("mock send failure".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_messages() {
        let channel = MockNotificationChannel::new();
        channel
            .send(&NotificationMessage {
                title: "t".to_string(),
                body: "b".to_string(),
            })
            .await
            .unwrap();

        let sent = channel.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "t");
    }

    #[tokio::test]
    async fn test_failing_channel() {
        let channel = MockNotificationChannel::failing();
        let result = channel
            .send(&NotificationMessage {
                title: "t".to_string(),
                body: "b".to_string(),
            })
            .await;
        assert!(result.is_err());
        assert!(channel.sent_messages().is_empty());
    }
}
