//! Outbound notifications.
//!
//! Jobs talk to a [`Notifier`] through an [`Outbox`], which adds the
//! admin channel name and retries transient delivery failures.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use parkhub_core::config::DeliveryConfig;
use parkhub_entity::user::User;

use crate::retry::{RetryPolicy, retry_with_backoff};

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipient {
    /// A user's inbox.
    User {
        /// Display name.
        username: String,
        /// Mailbox address.
        email: String,
    },
    /// A broadcast/admin channel.
    Channel {
        /// Channel name.
        name: String,
    },
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { email, .. } => write!(f, "{email}"),
            Self::Channel { name } => write!(f, "#{name}"),
        }
    }
}

/// A file sent along with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub file_name: String,
    /// MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// One outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Destination.
    pub recipient: Recipient,
    /// Subject line; empty for channel posts.
    pub subject: String,
    /// Body text or HTML.
    pub body: String,
    /// Attached files.
    pub attachments: Vec<Attachment>,
}

/// Failure to hand a message to the transport.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The transport is unreachable or timed out.
    #[error("Delivery to {recipient} failed: {reason}")]
    Unavailable {
        /// Intended recipient.
        recipient: String,
        /// Transport error.
        reason: String,
    },
    /// The transport refused the message; retrying will not help.
    #[error("Delivery to {recipient} rejected: {reason}")]
    Rejected {
        /// Intended recipient.
        recipient: String,
        /// Rejection reason.
        reason: String,
    },
}

impl DeliveryError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Transport for outbound notifications (mail, chat webhook, ...).
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug + 'static {
    /// Deliver one message.
    async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
}

/// Writes every message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        let attachments: Vec<&str> = message
            .attachments
            .iter()
            .map(|a| a.file_name.as_str())
            .collect();
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            ?attachments,
            "Notification: {}",
            message.body
        );
        Ok(())
    }
}

/// Retrying front of a [`Notifier`].
#[derive(Debug, Clone)]
pub struct Outbox {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    channel: String,
}

impl Outbox {
    /// Create an outbox from delivery configuration.
    pub fn new(notifier: Arc<dyn Notifier>, config: &DeliveryConfig) -> Self {
        Self::with_policy(notifier, RetryPolicy::from(config), config.channel_name.clone())
    }

    /// Create an outbox with an explicit retry policy.
    pub fn with_policy(notifier: Arc<dyn Notifier>, policy: RetryPolicy, channel: String) -> Self {
        Self {
            notifier,
            policy,
            channel,
        }
    }

    /// Deliver a message, retrying transient failures.
    pub async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        retry_with_backoff(
            &self.policy,
            || self.notifier.send(message),
            DeliveryError::is_transient,
            "deliver_notification",
        )
        .await
    }

    /// Send a message to a user.
    pub async fn send_to_user(
        &self,
        user: &User,
        subject: &str,
        body: String,
        attachments: Vec<Attachment>,
    ) -> Result<(), DeliveryError> {
        self.deliver(&Message {
            recipient: Recipient::User {
                username: user.username.clone(),
                email: user.email.clone(),
            },
            subject: subject.to_string(),
            body,
            attachments,
        })
        .await
    }

    /// Post a line to the admin channel.
    pub async fn post_to_channel(&self, text: String) -> Result<(), DeliveryError> {
        self.deliver(&Message {
            recipient: Recipient::Channel {
                name: self.channel.clone(),
            },
            subject: String::new(),
            body: text,
            attachments: Vec::new(),
        })
        .await
    }
}
