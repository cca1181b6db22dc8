//! Image Processor - validation stub for the transform step.
//!
//! The resize/validate algorithm itself is out of scope; this consumer
//! checks that the event looks like a processable image and logs what the
//! transform would do. It runs under a strict dispatcher so a future real
//! implementation inherits retry-on-failure semantics without rewiring.

use super::{has_image_extension, Consumer, ConsumerError, Disposition};
use crate::event::ObjectCreatedEvent;
use async_trait::async_trait;
use tracing::{debug, info};

/// Stub consumer standing in for the image transform.
#[derive(Debug, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Consumer for ImageProcessor {
    fn name(&self) -> &str {
        "image-processor"
    }

    async fn handle(&self, event: &ObjectCreatedEvent) -> Result<Disposition, ConsumerError> {
        if event.key.is_empty() {
            return Err(ConsumerError::Failed("empty object key".to_string()));
        }

        if !has_image_extension(&event.key) {
            debug!(key = %event.key, "not an image, nothing to process");
            return Ok(Disposition::Skipped("not an image extension"));
        }

        info!(
            bucket = %event.bucket,
            key = %event.key,
            size = event.size,
            "image validated, transform not yet implemented"
        );
        Ok(Disposition::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_image_is_processed() {
        let processor = ImageProcessor::new();
        let event = ObjectCreatedEvent::new("photos", "cat.jpg", 10);

        assert_eq!(
            processor.handle(&event).await.unwrap(),
            Disposition::Processed
        );
    }

    #[tokio::test]
    async fn test_non_image_is_skipped() {
        let processor = ImageProcessor::new();
        let event = ObjectCreatedEvent::new("photos", "notes.txt", 10);

        assert!(matches!(
            processor.handle(&event).await.unwrap(),
            Disposition::Skipped(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_key_is_error() {
        let processor = ImageProcessor::new();
        let event = ObjectCreatedEvent::new("photos", "", 10);

        assert!(processor.handle(&event).await.is_err());
    }
}
