//! End-to-end pipeline tests: topic fan-out, queue redelivery, and the
//! strict/lenient consumer semantics, with fakes injected at the store and
//! mailer seams.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use darkroom::consumers::{ImageProcessor, MetadataLogger, Notifier};
use darkroom::dispatcher::Dispatcher;
use darkroom::event::{
    StorageBucket, StorageEntity, StorageEventBatch, StorageEventRecord, StorageObject,
    STORAGE_EVENT_SOURCE,
};
use darkroom::mailer::{MailError, Mailer, MemoryMailer, Notification};
use darkroom::queue::InMemoryQueue;
use darkroom::store::{ImageRecord, MemoryRecordStore, RecordStore, StoreError};
use darkroom::topic::NotificationTopic;

const VISIBILITY: Duration = Duration::from_millis(50);
const LINGER: Duration = Duration::from_millis(10);

fn record(bucket: &str, key: &str, size: u64) -> StorageEventRecord {
    StorageEventRecord {
        event_source: STORAGE_EVENT_SOURCE.to_string(),
        event_name: "ObjectCreated:Put".to_string(),
        event_time: None,
        s3: StorageEntity {
            bucket: StorageBucket {
                name: bucket.to_string(),
            },
            object: StorageObject {
                key: key.to_string(),
                size,
            },
        },
    }
}

fn batch(records: Vec<StorageEventRecord>) -> StorageEventBatch {
    StorageEventBatch { records }
}

/// Store that fails every put for keys containing a marker, a fixed number
/// of times, then succeeds - simulates transient throttling.
struct FlakyStore {
    inner: MemoryRecordStore,
    marker: &'static str,
    failures_left: tokio::sync::Mutex<u32>,
}

impl FlakyStore {
    fn new(marker: &'static str, failures: u32) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            marker,
            failures_left: tokio::sync::Mutex::new(failures),
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn put_record(&self, record: &ImageRecord) -> Result<(), StoreError> {
        if record.id.contains(self.marker) {
            let mut left = self.failures_left.lock().await;
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Put("throttled".to_string()));
            }
        }
        self.inner.put_record(record).await
    }
}

/// Mailer that always fails, for lenient-path tests.
struct DownMailer;

#[async_trait]
impl Mailer for DownMailer {
    async fn send(&self, _notification: &Notification) -> Result<(), MailError> {
        Err(MailError::Send("provider unavailable".to_string()))
    }
}

/// Wire up the full fixed fan-out: one topic, three queues, three consumers.
struct Pipeline {
    topic: NotificationTopic,
    metadata_queue: Arc<InMemoryQueue>,
    processor_queue: Arc<InMemoryQueue>,
    notifier_queue: Arc<InMemoryQueue>,
    metadata: Dispatcher,
    processor: Dispatcher,
    notifier: Dispatcher,
}

fn pipeline(store: Arc<dyn RecordStore>, mailer: Arc<dyn Mailer>) -> Pipeline {
    let metadata_queue = Arc::new(InMemoryQueue::new("log-image", VISIBILITY));
    let processor_queue = Arc::new(InMemoryQueue::new("process-image", VISIBILITY));
    let notifier_queue = Arc::new(InMemoryQueue::new("mailer", VISIBILITY));

    let mut topic = NotificationTopic::new();
    topic.subscribe(metadata_queue.clone());
    topic.subscribe(processor_queue.clone());
    topic.subscribe(notifier_queue.clone());

    Pipeline {
        topic,
        metadata_queue,
        processor_queue,
        notifier_queue,
        metadata: Dispatcher::strict(Arc::new(MetadataLogger::new(store))),
        processor: Dispatcher::strict(Arc::new(ImageProcessor::new())),
        notifier: Dispatcher::lenient(Arc::new(Notifier::new(
            mailer,
            "owner@example.com",
            "s3",
        ))),
    }
}

/// Drain one queue through its dispatcher once, acknowledging successes.
async fn drain(queue: &InMemoryQueue, dispatcher: &Dispatcher) -> usize {
    let messages = queue.receive(10, LINGER).await;
    let result = dispatcher.run_batch(&messages).await;
    for receipt in result.succeeded_ids() {
        queue.acknowledge(receipt).await;
    }
    result.failed_ids().len()
}

#[tokio::test]
async fn fan_out_drives_all_three_consumers() {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store.clone(), mailer.clone());

    p.topic
        .publish(&batch(vec![record("photos", "cat.jpg", 1024)]))
        .await
        .unwrap();

    assert_eq!(drain(&p.metadata_queue, &p.metadata).await, 0);
    assert_eq!(drain(&p.processor_queue, &p.processor).await, 0);
    assert_eq!(drain(&p.notifier_queue, &p.notifier).await, 0);

    // Metadata logged
    let stored = store.get("cat.jpg").await.unwrap();
    assert_eq!(stored.bucket, "photos");
    assert_eq!(stored.size, 1024);

    // Notification sent with the canonical locator
    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body_text.contains("s3://photos/cat.jpg"));

    // Every queue fully drained
    assert_eq!(p.metadata_queue.depth().await, 0);
    assert_eq!(p.processor_queue.depth().await, 0);
    assert_eq!(p.notifier_queue.depth().await, 0);
}

#[tokio::test]
async fn duplicate_deliveries_coalesce_into_one_record() {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store.clone(), mailer);

    // The same notification delivered three times (at-least-once upstream)
    for _ in 0..3 {
        p.topic
            .publish(&batch(vec![record("photos", "cat.jpg", 1024)]))
            .await
            .unwrap();
    }
    assert_eq!(drain(&p.metadata_queue, &p.metadata).await, 0);

    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("cat.jpg").await.unwrap().size, 1024);
}

#[tokio::test]
async fn encoded_keys_are_decoded_before_any_consumer() {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store.clone(), mailer.clone());

    p.topic
        .publish(&batch(vec![record("photos", "a+b%20c.png", 7)]))
        .await
        .unwrap();

    drain(&p.metadata_queue, &p.metadata).await;
    drain(&p.notifier_queue, &p.notifier).await;

    // Decoded key is the store identifier
    assert!(store.get("a b c.png").await.is_some());
    assert!(store.get("a+b%20c.png").await.is_none());

    // And the locator in the body uses the decoded form
    let sent = mailer.sent().await;
    assert!(sent[0].body_text.contains("s3://photos/a b c.png"));
}

#[tokio::test]
async fn extension_filter_gates_the_store_not_the_mail() {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store.clone(), mailer.clone());

    p.topic
        .publish(&batch(vec![
            record("photos", "notes.txt", 1),
            record("photos", "anim.gif", 1),
            record("photos", "pic.PNG", 1),
        ]))
        .await
        .unwrap();

    drain(&p.metadata_queue, &p.metadata).await;
    drain(&p.notifier_queue, &p.notifier).await;

    // Only the image was logged
    assert_eq!(store.len().await, 1);
    assert!(store.get("pic.PNG").await.is_some());

    // But all three uploads notified
    assert_eq!(mailer.sent().await.len(), 3);
}

#[tokio::test]
async fn strict_failure_redelivers_only_the_failed_message() {
    // First put for the marked key fails, the retry succeeds
    let store = Arc::new(FlakyStore::new("flaky", 1));
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store.clone(), mailer);

    // Three separate notifications -> three queue messages
    p.topic
        .publish(&batch(vec![record("photos", "a.jpg", 1)]))
        .await
        .unwrap();
    p.topic
        .publish(&batch(vec![record("photos", "flaky.jpg", 1)]))
        .await
        .unwrap();
    p.topic
        .publish(&batch(vec![record("photos", "c.jpg", 1)]))
        .await
        .unwrap();

    // First pass: two messages acknowledged, the flaky one left in flight
    assert_eq!(drain(&p.metadata_queue, &p.metadata).await, 1);
    assert_eq!(p.metadata_queue.depth().await, 1);
    assert!(store.inner.get("a.jpg").await.is_some());
    assert!(store.inner.get("c.jpg").await.is_some());
    assert!(store.inner.get("flaky.jpg").await.is_none());

    // After the visibility window only the failed message comes back
    tokio::time::sleep(VISIBILITY + Duration::from_millis(20)).await;
    let redelivered = p.metadata_queue.receive(10, LINGER).await;
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].receive_count, 2);

    let result = p.metadata.run_batch(&redelivered).await;
    assert!(result.is_success());
    for receipt in result.succeeded_ids() {
        p.metadata_queue.acknowledge(receipt).await;
    }

    assert!(store.inner.get("flaky.jpg").await.is_some());
    assert_eq!(p.metadata_queue.depth().await, 0);
}

#[tokio::test]
async fn lenient_notifier_never_retries() {
    let store = Arc::new(MemoryRecordStore::new());
    let p = pipeline(store, Arc::new(DownMailer));

    p.topic
        .publish(&batch(vec![record("photos", "cat.jpg", 1)]))
        .await
        .unwrap();

    // The send fails, but the batch reports success and is acknowledged
    assert_eq!(drain(&p.notifier_queue, &p.notifier).await, 0);
    assert_eq!(p.notifier_queue.depth().await, 0);

    // Nothing comes back after the visibility window either
    tokio::time::sleep(VISIBILITY + Duration::from_millis(20)).await;
    assert!(p.notifier_queue.receive(10, LINGER).await.is_empty());
}

#[tokio::test]
async fn consumers_are_independent_per_queue() {
    // The metadata store being down does not slow down notifications
    let store = Arc::new(FlakyStore::new(".", u32::MAX));
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store, mailer.clone());

    p.topic
        .publish(&batch(vec![record("photos", "cat.jpg", 1)]))
        .await
        .unwrap();

    assert_eq!(drain(&p.metadata_queue, &p.metadata).await, 1);
    assert_eq!(drain(&p.notifier_queue, &p.notifier).await, 0);

    assert_eq!(mailer.sent().await.len(), 1);
    assert_eq!(p.metadata_queue.depth().await, 1);
    assert_eq!(p.notifier_queue.depth().await, 0);
}

#[tokio::test]
async fn control_messages_pass_through_without_effects() {
    let store = Arc::new(MemoryRecordStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let p = pipeline(store.clone(), mailer.clone());

    p.metadata_queue.send(r#"{"control": "ping"}"#).await;
    p.notifier_queue.send(r#"{"control": "ping"}"#).await;

    assert_eq!(drain(&p.metadata_queue, &p.metadata).await, 0);
    assert_eq!(drain(&p.notifier_queue, &p.notifier).await, 0);

    assert!(store.is_empty().await);
    assert!(mailer.sent().await.is_empty());
}
