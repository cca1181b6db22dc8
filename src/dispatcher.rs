//! Dispatcher / Batch Runner - drives one consumer over queue batches.
//!
//! For each message in a batch: unwrap it into zero or more canonical
//! events, invoke the bound consumer per event, and record a per-message
//! outcome. Messages are processed independently, so one bad message never
//! poisons its siblings; the caller acknowledges everything except
//! [`BatchResult::failed_ids`], and the queue redelivers only what actually
//! failed.
//!
//! # Failure modes
//!
//! ```text
//! Mode    | Unwrap error            | Consumer error
//! --------|-------------------------|----------------------------------
//! Strict  | message fails           | message fails, remaining events
//!         |                         | in that message are abandoned
//! Lenient | logged, message succeeds| logged, siblings still processed,
//!         |                         | message succeeds (no retry)
//! ```
//!
//! Strict backs the metadata logger and the processor (a dropped write must
//! be redelivered); lenient backs the notifier (a dropped mail is
//! accepted). The asymmetry is intentional and must be preserved.

use crate::consumers::{Consumer, ConsumerError, Disposition};
use crate::envelope::{unwrap_message, UnwrapError};
use crate::queue::RawMessage;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// How a dispatcher treats per-message errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// First error fails the message; the queue redelivers it
    Strict,

    /// Errors are logged and swallowed; effects are best-effort
    Lenient,
}

/// Why a message failed under strict dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Unwrap(#[from] UnwrapError),

    #[error("consumer '{consumer}' failed for key '{key}': {source}")]
    Consumer {
        consumer: String,
        key: String,
        #[source]
        source: ConsumerError,
    },
}

/// Counters for one successfully completed message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageStats {
    /// Events the consumer processed to completion
    pub processed: usize,

    /// Events the consumer deemed ineligible
    pub skipped: usize,

    /// Per-event failures swallowed in lenient mode
    pub dropped: usize,
}

/// Outcome of one message in a batch.
#[derive(Debug)]
pub struct MessageOutcome {
    /// Queue-assigned message identifier (delivery receipt)
    pub message_id: String,

    pub result: Result<MessageStats, DispatchError>,
}

/// Outcome of a whole batch: one entry per message, in input order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchResult {
    /// True when every message succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Identifiers of the messages that failed and need redelivery.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.message_id.as_str())
            .collect()
    }

    /// Identifiers of the messages safe to acknowledge.
    pub fn succeeded_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.message_id.as_str())
            .collect()
    }

    /// Summed stats across succeeded messages.
    pub fn totals(&self) -> MessageStats {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .fold(MessageStats::default(), |acc, s| MessageStats {
                processed: acc.processed + s.processed,
                skipped: acc.skipped + s.skipped,
                dropped: acc.dropped + s.dropped,
            })
    }
}

/// Batch runner binding one consumer to one failure mode.
///
/// Owns no queue: the caller pulls batches and acknowledges messages, the
/// dispatcher only evaluates them. That keeps it testable against plain
/// message slices.
pub struct Dispatcher {
    consumer: Arc<dyn Consumer>,
    mode: FailureMode,
}

impl Dispatcher {
    pub fn new(consumer: Arc<dyn Consumer>, mode: FailureMode) -> Self {
        Self { consumer, mode }
    }

    /// Strict dispatcher: errors fail the message for redelivery.
    pub fn strict(consumer: Arc<dyn Consumer>) -> Self {
        Self::new(consumer, FailureMode::Strict)
    }

    /// Lenient dispatcher: errors are logged and swallowed.
    pub fn lenient(consumer: Arc<dyn Consumer>) -> Self {
        Self::new(consumer, FailureMode::Lenient)
    }

    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    /// Evaluate one batch, message by message, sequentially.
    pub async fn run_batch(&self, batch: &[RawMessage]) -> BatchResult {
        let mut result = BatchResult::default();

        for message in batch {
            let outcome = self.run_message(message).await;

            match &outcome {
                Ok(stats) => debug!(
                    consumer = %self.consumer.name(),
                    message_id = %message.id,
                    processed = stats.processed,
                    skipped = stats.skipped,
                    "message completed"
                ),
                Err(e) => error!(
                    consumer = %self.consumer.name(),
                    message_id = %message.id,
                    error = %e,
                    "message failed, eligible for redelivery"
                ),
            }

            result.outcomes.push(MessageOutcome {
                message_id: message.id.clone(),
                result: outcome,
            });
        }

        let totals = result.totals();
        info!(
            consumer = %self.consumer.name(),
            messages = batch.len(),
            failed = result.failed_ids().len(),
            processed = totals.processed,
            skipped = totals.skipped,
            "batch evaluated"
        );

        result
    }

    async fn run_message(&self, message: &RawMessage) -> Result<MessageStats, DispatchError> {
        let events = match unwrap_message(&message.body) {
            Ok(events) => events,
            Err(e) => match self.mode {
                FailureMode::Strict => return Err(e.into()),
                FailureMode::Lenient => {
                    warn!(
                        consumer = %self.consumer.name(),
                        message_id = %message.id,
                        error = %e,
                        "unwrap failed, dropping message (lenient)"
                    );
                    return Ok(MessageStats {
                        dropped: 1,
                        ..MessageStats::default()
                    });
                }
            },
        };

        let mut stats = MessageStats::default();

        for event in &events {
            match self.consumer.handle(event).await {
                Ok(Disposition::Processed) => stats.processed += 1,
                Ok(Disposition::Skipped(reason)) => {
                    debug!(
                        consumer = %self.consumer.name(),
                        key = %event.key,
                        reason = reason,
                        "event skipped"
                    );
                    stats.skipped += 1;
                }
                Err(e) => match self.mode {
                    // Strict: abandon the rest of this message's events and
                    // fail the message; siblings in the batch are unaffected.
                    FailureMode::Strict => {
                        return Err(DispatchError::Consumer {
                            consumer: self.consumer.name().to_string(),
                            key: event.key.clone(),
                            source: e,
                        });
                    }
                    // Lenient: the effect is lost, siblings still run.
                    FailureMode::Lenient => {
                        warn!(
                            consumer = %self.consumer.name(),
                            key = %event.key,
                            error = %e,
                            "event failed, continuing (lenient)"
                        );
                        stats.dropped += 1;
                    }
                },
            }
        }

        Ok(stats)
    }
}
