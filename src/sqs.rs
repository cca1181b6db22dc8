//! Managed-queue source feeding a dispatcher in production.
//!
//! Thin stateless wrapper over the SQS client: receive a batch with a
//! long-poll wait, acknowledge by deleting the delivery. The client is
//! constructed once per process and shared; redelivery of unacknowledged
//! messages is the queue's visibility timeout, not ours.

use crate::queue::RawMessage;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue receive failed: {0}")]
    Receive(String),

    #[error("queue acknowledge failed: {0}")]
    Acknowledge(String),
}

/// One consumer's view of its managed queue.
#[derive(Clone)]
pub struct SqsSource {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsSource {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Receive up to `max` messages, long-polling for at most
    /// `wait_seconds`. An empty vec is routine, not an error.
    ///
    /// The returned [`RawMessage::id`] is the delivery receipt; the queue
    /// does not expose a per-delivery receive count, so `receive_count` is
    /// always 1 here.
    pub async fn receive(&self, max: i32, wait_seconds: i32) -> Result<Vec<RawMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        let mut batch = Vec::new();
        for message in response.messages() {
            let (Some(receipt), Some(body)) = (message.receipt_handle(), message.body()) else {
                warn!(queue = %self.queue_url, "delivery without receipt or body, ignoring");
                continue;
            };
            batch.push(RawMessage {
                id: receipt.to_string(),
                body: body.to_string(),
                receive_count: 1,
            });
        }

        if !batch.is_empty() {
            debug!(queue = %self.queue_url, count = batch.len(), "batch received");
        }
        Ok(batch)
    }

    /// Acknowledge one delivery by receipt, removing it from the queue.
    pub async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::Acknowledge(e.to_string()))?;
        Ok(())
    }
}
