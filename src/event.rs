//! Canonical event types for the pipeline.
//!
//! Upstream, the object store emits a notification batch; the pub/sub topic
//! may wrap that batch once more before it lands on a queue. The raw wire
//! shapes live here ([`StorageEventBatch`], [`TopicEnvelope`]) alongside the
//! canonical [`ObjectCreatedEvent`] every consumer works with.
//!
//! Object keys arrive percent-encoded with literal `+` standing for a space
//! (a form-encoding artifact the upstream store preserves). The key is fully
//! decoded here, before any consumer inspects its extension or uses it as an
//! identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Source marker the object store stamps on each notification record.
pub const STORAGE_EVENT_SOURCE: &str = "aws:s3";

/// Event-name family prefix for object creation (covers `Put`, `Post`,
/// `Copy`, and `CompleteMultipartUpload` variants).
pub const OBJECT_CREATED_PREFIX: &str = "ObjectCreated";

/// The canonical unwrapped unit of work.
///
/// # Example
///
/// ```json
/// {
///   "bucket": "photos",
///   "key": "holiday 01.png",
///   "size": 81290,
///   "eventTime": "2026-08-28T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    /// Source container identifier
    pub bucket: String,

    /// Object path, fully decoded (`+` mapped to space, then percent-decoded)
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Event time from the upstream record, or processing time if absent
    #[serde(rename = "eventTime")]
    pub event_time: DateTime<Utc>,
}

impl ObjectCreatedEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size: u64) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
            event_time: Utc::now(),
        }
    }

    /// Set the event time
    pub fn with_event_time(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = event_time;
        self
    }
}

/// Failure to decode a percent-encoded object key.
#[derive(Debug, Error)]
#[error("object key is not valid percent-encoded UTF-8: {raw}")]
pub struct KeyDecodeError {
    /// The raw, undecoded key
    pub raw: String,
}

/// Decode a raw object key: literal `+` becomes a space, then the result is
/// percent-decoded.
///
/// The `+`-to-space mapping is a legacy form-encoding artifact that must be
/// preserved for compatibility with keys already stored upstream.
pub fn decode_object_key(raw: &str) -> Result<String, KeyDecodeError> {
    let plus_mapped = raw.replace('+', " ");
    urlencoding::decode(&plus_mapped)
        .map(|cow| cow.into_owned())
        .map_err(|_| KeyDecodeError {
            raw: raw.to_string(),
        })
}

/// A notification batch as emitted by the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEventBatch {
    #[serde(rename = "Records")]
    pub records: Vec<StorageEventRecord>,
}

/// One record inside a [`StorageEventBatch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEventRecord {
    #[serde(rename = "eventSource", default)]
    pub event_source: String,

    #[serde(rename = "eventName", default)]
    pub event_name: String,

    #[serde(rename = "eventTime", skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,

    pub s3: StorageEntity,
}

impl StorageEventRecord {
    /// True when this record is an object-creation event from the storage
    /// source. Anything else is skipped by the unwrapper, not an error.
    pub fn is_object_created(&self) -> bool {
        self.event_source == STORAGE_EVENT_SOURCE
            && self.event_name.starts_with(OBJECT_CREATED_PREFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEntity {
    pub bucket: StorageBucket,
    pub object: StorageObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageBucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageObject {
    /// Percent-encoded key, `+` for space
    pub key: String,

    #[serde(default)]
    pub size: u64,
}

impl TryFrom<&StorageEventRecord> for ObjectCreatedEvent {
    type Error = KeyDecodeError;

    fn try_from(record: &StorageEventRecord) -> Result<Self, Self::Error> {
        Ok(ObjectCreatedEvent {
            bucket: record.s3.bucket.name.clone(),
            key: decode_object_key(&record.s3.object.key)?,
            size: record.s3.object.size,
            event_time: record.event_time.unwrap_or_else(Utc::now),
        })
    }
}

/// The pub/sub envelope the topic wraps around a notification batch before
/// delivering it to a queue.
///
/// `Message` is either the stringified batch (the normal topic delivery) or
/// an already-parsed object (raw-delivery subscriptions); both forms must be
/// accepted, so it is kept as an untyped [`Value`] here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEnvelope {
    #[serde(rename = "Type")]
    pub envelope_type: String,

    #[serde(rename = "MessageId")]
    pub message_id: String,

    #[serde(rename = "Message")]
    pub message: Value,

    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}
