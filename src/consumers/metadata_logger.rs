//! Metadata Logger - persists a record per eligible upload.
//!
//! Eligibility is a case-insensitive suffix match against the image
//! extensions; everything else is dropped with a log line. Eligible events
//! become an [`ImageRecord`] upserted by decoded key, so duplicate
//! deliveries of the same object coalesce into a last-writer-wins record.
//!
//! Store failures propagate: this consumer runs under a strict dispatcher
//! so the queue redelivers the message rather than losing the write.

use super::{has_image_extension, Consumer, ConsumerError, Disposition};
use crate::event::ObjectCreatedEvent;
use crate::store::{ImageRecord, RecordStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Consumer that writes image metadata to the record store.
pub struct MetadataLogger {
    store: Arc<dyn RecordStore>,
}

impl MetadataLogger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Consumer for MetadataLogger {
    fn name(&self) -> &str {
        "metadata-logger"
    }

    async fn handle(&self, event: &ObjectCreatedEvent) -> Result<Disposition, ConsumerError> {
        if !has_image_extension(&event.key) {
            debug!(key = %event.key, "skipping non-image upload");
            return Ok(Disposition::Skipped("not an image extension"));
        }

        let record = ImageRecord {
            id: event.key.clone(),
            // Logger's local processing time, deliberately not the event time
            upload_time: Utc::now(),
            size: event.size,
            bucket: event.bucket.clone(),
        };

        self.store.put_record(&record).await?;

        info!(id = %record.id, bucket = %record.bucket, "image metadata logged");
        Ok(Disposition::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecordStore, StoreError};

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn put_record(&self, _record: &ImageRecord) -> Result<(), StoreError> {
            Err(StoreError::Put("throttled".to_string()))
        }
    }

    #[tokio::test]
    async fn test_eligible_event_is_written() {
        let store = Arc::new(MemoryRecordStore::new());
        let logger = MetadataLogger::new(store.clone());

        let event = ObjectCreatedEvent::new("photos", "cat.jpg", 1024);
        let disposition = logger.handle(&event).await.unwrap();

        assert_eq!(disposition, Disposition::Processed);
        let record = store.get("cat.jpg").await.unwrap();
        assert_eq!(record.bucket, "photos");
        assert_eq!(record.size, 1024);
    }

    #[tokio::test]
    async fn test_mixed_case_extensions_are_written() {
        let store = Arc::new(MemoryRecordStore::new());
        let logger = MetadataLogger::new(store.clone());

        for key in ["a.JPG", "b.Jpeg", "c.PNG"] {
            let disposition = logger
                .handle(&ObjectCreatedEvent::new("photos", key, 1))
                .await
                .unwrap();
            assert_eq!(disposition, Disposition::Processed);
        }
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_ineligible_events_never_write() {
        let store = Arc::new(MemoryRecordStore::new());
        let logger = MetadataLogger::new(store.clone());

        for key in ["a.gif", "b.bmp", "c.txt", "no_extension"] {
            let disposition = logger
                .handle(&ObjectCreatedEvent::new("photos", key, 1))
                .await
                .unwrap();
            assert!(matches!(disposition, Disposition::Skipped(_)), "{key}");
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_deliveries_coalesce() {
        let store = Arc::new(MemoryRecordStore::new());
        let logger = MetadataLogger::new(store.clone());

        let event = ObjectCreatedEvent::new("photos", "cat.jpg", 1024);
        logger.handle(&event).await.unwrap();
        let first_time = store.get("cat.jpg").await.unwrap().upload_time;

        logger.handle(&event).await.unwrap();
        logger.handle(&event).await.unwrap();

        assert_eq!(store.len().await, 1);
        // Last delivery wins: upload time reflects the latest processing
        assert!(store.get("cat.jpg").await.unwrap().upload_time >= first_time);
    }

    #[tokio::test]
    async fn test_decoded_key_is_the_identifier() {
        let store = Arc::new(MemoryRecordStore::new());
        let logger = MetadataLogger::new(store.clone());

        // The dispatcher hands over already-decoded keys
        let event = ObjectCreatedEvent::new("photos", "a b c.png", 7);
        logger.handle(&event).await.unwrap();

        assert!(store.get("a b c.png").await.is_some());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let logger = MetadataLogger::new(Arc::new(FailingStore));
        let event = ObjectCreatedEvent::new("photos", "cat.jpg", 1);

        let err = logger.handle(&event).await.unwrap_err();
        assert!(matches!(err, ConsumerError::Store(_)));
    }
}
