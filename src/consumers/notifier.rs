//! Notifier - mails an upload notification per event.
//!
//! Deliberately asymmetric with the metadata logger: there is no extension
//! filter (notification is about upload activity, not image validity) and
//! it runs under a lenient dispatcher - a lost notification is low-cost, a
//! lost metadata write is not.
//!
//! The recipient is statically configured; the template admits no
//! user-supplied text.

use super::{Consumer, ConsumerError, Disposition};
use crate::event::ObjectCreatedEvent;
use crate::mailer::{notification_body, Mailer, Notification};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Consumer that sends a fixed-template notification for every upload.
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    recipient_email: String,
    locator_scheme: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        recipient_email: impl Into<String>,
        locator_scheme: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            recipient_email: recipient_email.into(),
            locator_scheme: locator_scheme.into(),
        }
    }

    fn build_notification(&self, event: &ObjectCreatedEvent) -> Notification {
        Notification {
            recipient_email: self.recipient_email.clone(),
            body_text: notification_body(&self.locator_scheme, event),
        }
    }
}

#[async_trait]
impl Consumer for Notifier {
    fn name(&self) -> &str {
        "notifier"
    }

    async fn handle(&self, event: &ObjectCreatedEvent) -> Result<Disposition, ConsumerError> {
        let notification = self.build_notification(event);
        self.mailer.send(&notification).await?;

        info!(
            bucket = %event.bucket,
            key = %event.key,
            to = %self.recipient_email,
            "upload notification sent"
        );
        Ok(Disposition::Processed)
    }
}
