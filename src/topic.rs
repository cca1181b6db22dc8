//! Notification Topic - logical fan-out to the subscribed queues.
//!
//! One published notification batch is delivered independently to every
//! subscription: each queue gets its own copy wrapped in the pub/sub
//! envelope, with `Message` carrying the stringified batch. Consumers must
//! also tolerate receiving a bare batch directly (dual-path compatibility,
//! handled by the unwrapper).
//!
//! There is no exactly-once guarantee anywhere downstream of this point;
//! consumers are correct under duplication and reordering by construction.

use crate::event::{StorageEventBatch, TopicEnvelope};
use crate::queue::InMemoryQueue;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Fixed fan-out topic: one producer event type, N subscribed queues.
#[derive(Default)]
pub struct NotificationTopic {
    subscriptions: Vec<Arc<InMemoryQueue>>,
}

impl NotificationTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a queue; every subsequent publish delivers a copy to it.
    pub fn subscribe(&mut self, queue: Arc<InMemoryQueue>) {
        debug!(queue = %queue.name(), "queue subscribed to topic");
        self.subscriptions.push(queue);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Publish one notification batch to every subscribed queue.
    pub async fn publish(&self, batch: &StorageEventBatch) -> Result<(), serde_json::Error> {
        let envelope = TopicEnvelope {
            envelope_type: "Notification".to_string(),
            message_id: Uuid::new_v4().to_string(),
            message: Value::String(serde_json::to_string(batch)?),
            timestamp: Utc::now(),
        };
        let payload = serde_json::to_string(&envelope)?;

        for queue in &self.subscriptions {
            queue.send(payload.clone()).await;
        }

        info!(
            message_id = %envelope.message_id,
            records = batch.records.len(),
            subscriptions = self.subscriptions.len(),
            "notification published"
        );
        Ok(())
    }
}
