//! Upload notification mail.
//!
//! The [`Mailer`] trait is the seam between the notifier consumer and the
//! email provider: production uses [`SesMailer`], tests inject
//! [`MemoryMailer`].
//!
//! Body text is a fixed template with no user-supplied free text; the
//! contact block (sender name and reply address) is configuration, not
//! uploader identity. That is an inherited deployment choice - confirm with
//! the system owner before generalizing it.

use crate::event::ObjectCreatedEvent;
use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Subject line for every upload notification.
pub const MAIL_SUBJECT: &str = "New image Upload";

/// An upload notification ready to send. Ephemeral, never persisted.
///
/// The contact block rendered into the mail (display name, reply address)
/// belongs to the sending [`Mailer`], not to the notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Address the notification is sent to
    pub recipient_email: String,

    /// Fixed-template body text embedding the object locator
    pub body_text: String,
}

/// Canonical locator string for an uploaded object.
pub fn object_locator(scheme: &str, event: &ObjectCreatedEvent) -> String {
    format!("{}://{}/{}", scheme, event.bucket, event.key)
}

/// Fixed notification body. No user-supplied text is permitted here.
pub fn notification_body(scheme: &str, event: &ObjectCreatedEvent) -> String {
    format!(
        "We received your Image. Its URL is {}",
        object_locator(scheme, event)
    )
}

/// HTML rendering of a notification: contact block plus message paragraph.
pub fn html_body(sender_name: &str, sender_email: &str, body_text: &str) -> String {
    format!(
        "<html>\
         <body>\
         <h2>Sent from: </h2>\
         <ul>\
         <li style=\"font-size:18px\">&#128100; <b>{sender_name}</b></li>\
         <li style=\"font-size:18px\">&#9993;&#65039; <b>{sender_email}</b></li>\
         </ul>\
         <p style=\"font-size:18px\">{body_text}</p>\
         </body>\
         </html>"
    )
}

/// Errors raised while sending a notification.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to build mail content: {0}")]
    Build(String),

    #[error("mail send failed: {0}")]
    Send(String),
}

/// Seam between the notifier and the email provider.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), MailError>;
}

/// SES-backed mailer.
///
/// The client is constructed once per process and reused across invocations.
#[derive(Clone)]
pub struct SesMailer {
    client: aws_sdk_sesv2::Client,
    from: String,
    sender_name: String,
}

impl SesMailer {
    pub fn new(
        client: aws_sdk_sesv2::Client,
        from: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            from: from.into(),
            sender_name: sender_name.into(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        debug!(to = %notification.recipient_email, "sending upload notification");

        let subject = Content::builder()
            .data(MAIL_SUBJECT)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::Build(e.to_string()))?;

        let html = Content::builder()
            .data(html_body(
                &self.sender_name,
                &self.from,
                &notification.body_text,
            ))
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::Build(e.to_string()))?;

        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().html(html).build())
            .build();

        let destination = Destination::builder()
            .to_addresses(&notification.recipient_email)
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                error!(to = %notification.recipient_email, error = %e, "send failed");
                MailError::Send(e.to_string())
            })?;

        info!(to = %notification.recipient_email, "upload notification sent");
        Ok(())
    }
}

/// In-memory mailer that records sent notifications, for tests.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
