//! In-process at-least-once queue.
//!
//! Durable for the process lifetime, unordered, at-least-once by
//! construction: a received message becomes invisible for a visibility
//! window and is redelivered with an incremented receive count unless
//! acknowledged first. Batch retrieval waits up to a linger window for the
//! batch to fill.
//!
//! This backs the integration tests and local runs; production consumers
//! pull from the managed queue instead (see [`crate::sqs`]).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Poll interval while waiting out the linger window.
const LINGER_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One delivery of a queued message.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Delivery receipt, unique per delivery; acknowledge with this
    pub id: String,

    /// Opaque payload
    pub body: String,

    /// How many times this message has been delivered (1 on first delivery)
    pub receive_count: u32,
}

struct QueueInner {
    ready: VecDeque<StoredMessage>,
    inflight: HashMap<String, InflightMessage>,
}

struct StoredMessage {
    body: String,
    receive_count: u32,
}

struct InflightMessage {
    body: String,
    receive_count: u32,
    delivered_at: Instant,
}

/// At-least-once buffer between the topic and one consumer.
pub struct InMemoryQueue {
    name: String,
    visibility: Duration,
    inner: Mutex<QueueInner>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>, visibility: Duration) -> Self {
        Self {
            name: name.into(),
            visibility,
            inner: Mutex::new(QueueInner {
                ready: VecDeque::new(),
                inflight: HashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue one message body.
    pub async fn send(&self, body: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.ready.push_back(StoredMessage {
            body: body.into(),
            receive_count: 0,
        });
    }

    /// Receive up to `max` messages, waiting at most `linger` for the batch
    /// to fill. Returns early as soon as anything is available once the
    /// linger window is consulted; an empty vec means the window elapsed
    /// with nothing ready.
    pub async fn receive(&self, max: usize, linger: Duration) -> Vec<RawMessage> {
        let deadline = Instant::now() + linger;

        loop {
            let batch = self.take_ready(max).await;
            if !batch.is_empty() || Instant::now() >= deadline {
                if !batch.is_empty() {
                    debug!(queue = %self.name, count = batch.len(), "batch received");
                }
                return batch;
            }
            tokio::time::sleep(LINGER_POLL_INTERVAL).await;
        }
    }

    /// Acknowledge a delivery, removing the message for good. Returns false
    /// if the receipt is unknown or its visibility window already expired.
    pub async fn acknowledge(&self, receipt: &str) -> bool {
        let mut inner = self.inner.lock().await;
        Self::requeue_expired(&mut inner, self.visibility);
        inner.inflight.remove(receipt).is_some()
    }

    /// Messages currently ready or in flight.
    pub async fn depth(&self) -> usize {
        let mut inner = self.inner.lock().await;
        Self::requeue_expired(&mut inner, self.visibility);
        inner.ready.len() + inner.inflight.len()
    }

    async fn take_ready(&self, max: usize) -> Vec<RawMessage> {
        let mut inner = self.inner.lock().await;
        Self::requeue_expired(&mut inner, self.visibility);

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(stored) = inner.ready.pop_front() else {
                break;
            };

            let receipt = Uuid::new_v4().to_string();
            let receive_count = stored.receive_count + 1;
            inner.inflight.insert(
                receipt.clone(),
                InflightMessage {
                    body: stored.body.clone(),
                    receive_count,
                    delivered_at: Instant::now(),
                },
            );
            batch.push(RawMessage {
                id: receipt,
                body: stored.body,
                receive_count,
            });
        }
        batch
    }

    /// Redelivery: unacknowledged deliveries past the visibility window go
    /// back to the tail of the ready queue.
    fn requeue_expired(inner: &mut QueueInner, visibility: Duration) {
        let expired: Vec<String> = inner
            .inflight
            .iter()
            .filter(|(_, m)| m.delivered_at.elapsed() >= visibility)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(m) = inner.inflight.remove(&receipt) {
                inner.ready.push_back(StoredMessage {
                    body: m.body,
                    receive_count: m.receive_count,
                });
            }
        }
    }
}
