//! Consumers - the downstream handlers events are dispatched to.
//!
//! Each queue is bound to exactly one consumer. The [`Consumer`] trait
//! defines the interface; the dispatcher invokes it once per unwrapped
//! event and applies its failure mode to the result.
//!
//! ## Built-in consumers
//!
//! - [`MetadataLogger`]: filters by image extension, upserts an
//!   [`crate::store::ImageRecord`] (strict semantics)
//! - [`ImageProcessor`]: validation stub for the future transform step
//! - [`Notifier`]: fixed-template upload notification mail (lenient
//!   semantics)
//!
//! ## Custom consumers
//!
//! ```rust,ignore
//! use darkroom::consumers::{Consumer, ConsumerError, Disposition};
//! use darkroom::event::ObjectCreatedEvent;
//! use async_trait::async_trait;
//!
//! struct MyConsumer;
//!
//! #[async_trait]
//! impl Consumer for MyConsumer {
//!     fn name(&self) -> &str {
//!         "my-consumer"
//!     }
//!
//!     async fn handle(&self, event: &ObjectCreatedEvent) -> Result<Disposition, ConsumerError> {
//!         Ok(Disposition::Processed)
//!     }
//! }
//! ```

pub mod image_processor;
pub mod metadata_logger;
pub mod notifier;

use crate::event::ObjectCreatedEvent;
use crate::mailer::MailError;
use crate::store::StoreError;
use async_trait::async_trait;
use thiserror::Error;

pub use image_processor::ImageProcessor;
pub use metadata_logger::MetadataLogger;
pub use notifier::Notifier;

/// Errors a consumer can raise for one event.
///
/// Whether such an error fails the enclosing message depends on the
/// dispatcher's failure mode, not on the consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Record store write failed (throttling, connectivity)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Notification send failed
    #[error(transparent)]
    Mail(#[from] MailError),

    /// Generic consumer failure
    #[error("consumer failed: {0}")]
    Failed(String),
}

/// What a consumer did with an event.
///
/// `Skipped` is not an error: ineligible events (wrong extension,
/// non-image uploads for the processor) are counted and logged, never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The consumer's side effect ran to completion
    Processed,

    /// The event was ineligible and dropped, with a reason
    Skipped(&'static str),
}

/// The core consumer trait.
///
/// Consumers are stateless units of work; any clients they hold (store,
/// mailer) are constructed once per process and shared. Implementations
/// must be `Send + Sync` so invocations can run concurrently across
/// batches.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Unique name of this consumer, used in logs and batch results
    fn name(&self) -> &str;

    /// Handle one canonical event.
    ///
    /// Both awaitable side effects (store write, mail send) must complete
    /// before returning - no fire-and-forget.
    async fn handle(&self, event: &ObjectCreatedEvent) -> Result<Disposition, ConsumerError>;
}

/// Case-insensitive image extension check shared by the logger and the
/// processor stub.
pub(crate) fn has_image_extension(key: &str) -> bool {
    const IMAGE_EXTENSIONS: [&str; 3] = [".jpeg", ".jpg", ".png"];

    let lower = key.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
