//! Envelope Unwrapper - normalizes raw queue messages.
//!
//! A notification may reach a queue in any of three forms:
//!
//! ```text
//! Shape             | Payload
//! ------------------|----------------------------------------------
//! bare batch        | {"Records": [...]}
//! enveloped, string | {"Message": "{\"Records\": [...]}", ...}
//! enveloped, object | {"Message": {"Records": [...]}, ...}
//! ```
//!
//! The unwrapper tries a small chain of typed shape matchers in that order;
//! each matcher either produces the canonical events or signals "not this
//! shape" so the next one runs. A payload matching no shape yields an empty
//! event list and is logged, not errored - upstream is allowed to send
//! control and test messages.
//!
//! Malformed JSON at any layer, and keys that fail percent-decoding, are
//! message-level errors: the enclosing message fails, sibling messages in
//! the batch are unaffected (see [`crate::dispatcher`]).

use crate::event::{KeyDecodeError, ObjectCreatedEvent, StorageEventBatch};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors raised while unwrapping a single queue message.
#[derive(Debug, Error)]
pub enum UnwrapError {
    /// The payload, or a nested `Message` layer, is not valid JSON
    #[error("malformed JSON in message payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A record matched the event filter but carried an undecodable key
    #[error(transparent)]
    KeyDecode(#[from] KeyDecodeError),
}

/// Outcome of a single shape matcher: either the events, or a signal to try
/// the next matcher.
enum ShapeMatch {
    Events(Vec<ObjectCreatedEvent>),
    NotThisShape,
}

/// Unwrap one raw queue message payload into zero or more canonical events.
///
/// Records whose source or event name does not mark them as object-creation
/// events are silently skipped with a diagnostic log.
pub fn unwrap_message(body: &str) -> Result<Vec<ObjectCreatedEvent>, UnwrapError> {
    let value: Value = serde_json::from_str(body)?;

    if let ShapeMatch::Events(events) = match_bare_batch(&value)? {
        return Ok(events);
    }
    if let ShapeMatch::Events(events) = match_enveloped(&value)? {
        return Ok(events);
    }

    debug!("payload matched no known notification shape, ignoring");
    Ok(Vec::new())
}

/// Matcher 1: the payload is already a notification batch.
fn match_bare_batch(value: &Value) -> Result<ShapeMatch, UnwrapError> {
    if value.get("Records").is_none() {
        return Ok(ShapeMatch::NotThisShape);
    }

    let batch: StorageEventBatch = serde_json::from_value(value.clone())?;
    Ok(ShapeMatch::Events(collect_events(&batch)?))
}

/// Matcher 2: the payload is a pub/sub envelope whose `Message` field holds
/// the batch, either as a JSON string or as a pre-parsed object.
fn match_enveloped(value: &Value) -> Result<ShapeMatch, UnwrapError> {
    let inner = match value.get("Message") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)?,
        Some(inner @ Value::Object(_)) => inner.clone(),
        _ => return Ok(ShapeMatch::NotThisShape),
    };

    match_bare_batch(&inner)
}

fn collect_events(batch: &StorageEventBatch) -> Result<Vec<ObjectCreatedEvent>, UnwrapError> {
    let mut events = Vec::new();

    for record in &batch.records {
        if !record.is_object_created() {
            debug!(
                event_source = %record.event_source,
                event_name = %record.event_name,
                "skipping non object-created record"
            );
            continue;
        }
        events.push(ObjectCreatedEvent::try_from(record)?);
    }

    Ok(events)
}
