//! Key-value record store for image metadata.
//!
//! The [`RecordStore`] trait is the seam between the metadata logger and the
//! storage backend: production uses [`DynamoRecordStore`], tests and local
//! runs inject [`MemoryRecordStore`].
//!
//! The write path is deliberately a single-item upsert with no
//! read-before-write and no conditional expression: re-processing the same
//! object key produces the same write, so duplicate deliveries coalesce into
//! a last-writer-wins record. That is the idempotency strategy, not an
//! accident.
//!
//! Known limitation, preserved on purpose: the record id is the decoded
//! object key alone, so the same key uploaded to two different buckets lands
//! on one record. A corrected design would key by `(bucket, key)`.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Metadata record persisted for each eligible upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Primary key: the decoded object key
    pub id: String,

    /// Logger's local processing time, not the original event time
    #[serde(rename = "uploadTime")]
    pub upload_time: DateTime<Utc>,

    /// Object size in bytes
    pub size: u64,

    /// Source bucket
    pub bucket: String,
}

/// Errors raised by a record store write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store put failed: {0}")]
    Put(String),
}

/// Seam between consumers and the record store backend.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert a single record keyed by `record.id`. Last writer wins.
    async fn put_record(&self, record: &ImageRecord) -> Result<(), StoreError>;
}

/// DynamoDB-backed record store.
///
/// The client is constructed once per process and reused across invocations;
/// it is already concurrency-safe, so no locking is needed here.
#[derive(Clone)]
pub struct DynamoRecordStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn put_record(&self, record: &ImageRecord) -> Result<(), StoreError> {
        debug!(
            table = %self.table_name,
            id = %record.id,
            bucket = %record.bucket,
            "writing image record"
        );

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("id", AttributeValue::S(record.id.clone()))
            .item(
                "uploadTime",
                AttributeValue::S(record.upload_time.to_rfc3339()),
            )
            .item("size", AttributeValue::N(record.size.to_string()))
            .item("bucket", AttributeValue::S(record.bucket.clone()))
            .send()
            .await
            .map_err(|e| {
                error!(table = %self.table_name, id = %record.id, error = %e, "put failed");
                StoreError::Put(e.to_string())
            })?;

        Ok(())
    }
}

/// In-memory record store for tests and local runs.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, ImageRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Fetch a record by id
    pub async fn get(&self, id: &str) -> Option<ImageRecord> {
        self.records.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put_record(&self, record: &ImageRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}
