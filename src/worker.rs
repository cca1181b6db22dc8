//! One invocation of a consumer over a received batch.
//!
//! The binary's consumer loops all run the same step: evaluate the batch
//! through the dispatcher under a wall-clock budget, then acknowledge what
//! succeeded. If the budget elapses mid-batch the whole batch is abandoned
//! unacknowledged - nothing is acked, no partial bookkeeping, and every
//! message becomes eligible for redelivery once its visibility window
//! lapses. [`run_invocation`] is that step, factored out of the loop so the
//! abandonment semantics are testable against the in-process queue.

use crate::dispatcher::{BatchResult, Dispatcher};
use crate::queue::{InMemoryQueue, RawMessage};
use crate::sqs::{QueueError, SqsSource};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, warn};

/// Acknowledgement seam between the invocation step and its queue.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// Acknowledge one delivery by receipt.
    async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError>;
}

#[async_trait]
impl Acknowledge for SqsSource {
    async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError> {
        SqsSource::acknowledge(self, receipt).await
    }
}

#[async_trait]
impl Acknowledge for InMemoryQueue {
    async fn acknowledge(&self, receipt: &str) -> Result<(), QueueError> {
        if InMemoryQueue::acknowledge(self, receipt).await {
            Ok(())
        } else {
            Err(QueueError::Acknowledge(format!(
                "unknown or expired receipt: {receipt}"
            )))
        }
    }
}

/// What one invocation did with its batch.
#[derive(Debug)]
pub enum InvocationOutcome {
    /// Evaluated within budget; failed messages were left unacknowledged
    /// for redelivery
    Completed(BatchResult),

    /// The budget elapsed mid-batch: nothing was acknowledged, the whole
    /// batch redelivers
    Abandoned,
}

/// Evaluate one batch under `budget` and acknowledge the messages that
/// succeeded. An exceeded budget abandons the batch whole.
pub async fn run_invocation<A>(
    dispatcher: &Dispatcher,
    queue: &A,
    batch: &[RawMessage],
    budget: Duration,
) -> InvocationOutcome
where
    A: Acknowledge,
{
    match tokio::time::timeout(budget, dispatcher.run_batch(batch)).await {
        Err(_) => {
            warn!(
                messages = batch.len(),
                budget_secs = budget.as_secs(),
                "invocation budget exceeded, abandoning batch"
            );
            InvocationOutcome::Abandoned
        }
        Ok(result) => {
            for receipt in result.succeeded_ids() {
                if let Err(e) = queue.acknowledge(receipt).await {
                    error!(error = %e, "acknowledge failed");
                }
            }
            if !result.is_success() {
                warn!(
                    failed = result.failed_ids().len(),
                    "messages left for redelivery"
                );
            }
            InvocationOutcome::Completed(result)
        }
    }
}
