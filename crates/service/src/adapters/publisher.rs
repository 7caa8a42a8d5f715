//! Outbound event publisher trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{AllocationEvent, DomainEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ServiceError;

/// An event as it left the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub message_id: Uuid,
    pub topic: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl PublishedMessage {
    /// Serializes an event into a message for `topic`.
    pub fn new(topic: &str, event: &AllocationEvent) -> Result<Self, ServiceError> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            topic: topic.to_string(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_value(event)?,
            published_at: Utc::now(),
        })
    }

    /// Decodes the payload back into the event.
    pub fn event(&self) -> Result<AllocationEvent, ServiceError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Publishes events to other systems.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `event` on `topic`.
    async fn publish(&self, topic: &str, event: &AllocationEvent) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    messages: Vec<PublishedMessage>,
    fail_on_publish: bool,
}

/// In-memory publisher that keeps every message it was given.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every publish.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Returns every published message, oldest first.
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.state.read().await.messages.clone()
    }

    /// Returns the messages published on one topic.
    pub async fn messages_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, event: &AllocationEvent) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;

        if state.fail_on_publish {
            return Err(ServiceError::Publish(format!("topic {topic} unavailable")));
        }

        let message = PublishedMessage::new(topic, event)?;
        tracing::debug!(
            topic,
            message_id = %message.message_id,
            event_type = %message.event_type,
            "event published"
        );
        state.messages.push(message);
        Ok(())
    }
}
