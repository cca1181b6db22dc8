//! # Darkroom
//!
//! Fan-out pipeline for object-store upload notifications.
//!
//! ## Architecture
//!
//! ```text
//! Object store -> Notification Topic -> {Queue x3} -> Dispatcher -> Consumer
//!                                                       |
//!                                        metadata-logger | image-processor | notifier
//! ```
//!
//! One "object created" notification fans out to three independent queues;
//! each queue drives one consumer through a [`dispatcher::Dispatcher`].
//! Delivery is at-least-once and unordered everywhere, so consumers are
//! idempotent by construction (upsert-by-key writes, side-effect-tolerant
//! sends) rather than by assumption.
//!
//! ## Modules
//!
//! - [`event`]: canonical `ObjectCreatedEvent` and the raw wire shapes
//! - [`envelope`]: unwraps a queue message regardless of transport nesting
//! - [`dispatcher`]: per-consumer batch runner, strict or lenient
//! - [`consumers`]: the three downstream handlers
//! - [`topic`] / [`queue`]: in-process fan-out and at-least-once buffering
//! - [`store`] / [`mailer`] / [`sqs`]: thin clients at the external seams
//! - [`worker`]: the budget-bounded evaluate-and-acknowledge step

pub mod config;
pub mod consumers;
pub mod dispatcher;
pub mod envelope;
pub mod event;
pub mod mailer;
pub mod queue;
pub mod shutdown;
pub mod sqs;
pub mod store;
pub mod topic;
pub mod worker;

// Re-export commonly used types at crate root
pub use consumers::{Consumer, ConsumerError, Disposition};
pub use dispatcher::{BatchResult, Dispatcher, FailureMode};
pub use envelope::{unwrap_message, UnwrapError};
pub use event::ObjectCreatedEvent;
