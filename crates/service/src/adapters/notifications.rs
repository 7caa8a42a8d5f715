//! Notification channel trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// A notification that was handed to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub destination: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Delivers human-readable notifications, e-mail or otherwise.
#[async_trait]
pub trait Notifications: Send + Sync {
    /// Sends `message` to `destination`.
    async fn send(&self, destination: &str, message: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationsState {
    sent: Vec<SentNotification>,
    fail_on_send: bool,
}

/// In-memory notification channel that records what it was asked to send.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifications {
    state: Arc<RwLock<InMemoryNotificationsState>>,
}

impl InMemoryNotifications {
    /// Creates a new in-memory notification channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the channel to fail every send.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// Returns everything sent so far, oldest first.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.state.read().await.sent.clone()
    }

    /// Returns the messages sent to one destination.
    pub async fn sent_to(&self, destination: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .sent
            .iter()
            .filter(|n| n.destination == destination)
            .map(|n| n.message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifications for InMemoryNotifications {
    async fn send(&self, destination: &str, message: &str) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;

        if state.fail_on_send {
            return Err(ServiceError::Notification(format!(
                "could not reach {destination}"
            )));
        }

        tracing::info!(destination, message, "notification sent");
        state.sent.push(SentNotification {
            destination: destination.to_string(),
            message: message.to_string(),
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_notifications() {
        let channel = InMemoryNotifications::new();
        channel.send("stock@made.com", "Out of stock for LAMP").await.unwrap();
        channel.send("ops@made.com", "hello").await.unwrap();

        assert_eq!(channel.sent().await.len(), 2);
        assert_eq!(
            channel.sent_to("stock@made.com").await,
            vec!["Out of stock for LAMP".to_string()]
        );
    }

    #[tokio::test]
    async fn failing_channel_records_nothing() {
        let channel = InMemoryNotifications::new();
        channel.set_fail_on_send(true).await;

        let result = channel.send("stock@made.com", "Out of stock for LAMP").await;

        assert!(matches!(result, Err(ServiceError::Notification(_))));
        assert!(channel.sent().await.is_empty());
    }
}
