use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::db::enums::ChannelKind;
use crate::notifications::credentials::ChannelCredentials;
use std::collections::HashMap;
use std::sync::Arc;

pub mod email;
pub mod slack;
pub mod telegram;
pub mod webhook;

/// One HTTP client shared by every outbound sender.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

/// A channel-ready message produced by the template renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Short context line (the topic name); used as the email subject.
    pub title: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum SenderError {
    /// The credential value cannot drive this sender. Permanent.
    #[error("invalid channel configuration: {0}")]
    InvalidConfiguration(String),
    /// The remote accepted the connection and refused the message. Permanent.
    #[error("message rejected: {0}")]
    Rejected(String),
    /// Connectivity or remote-side malfunction. Transient.
    #[error("network error: {0}")]
    Network(String),
    /// The attempt exceeded its time budget. Transient.
    #[error("send attempt timed out")]
    Timeout,
}

impl SenderError {
    /// Whether the scheduler may retry the same channel after this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, SenderError::Network(_) | SenderError::Timeout)
    }
}

impl From<reqwest::Error> for SenderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SenderError::Timeout
        } else {
            SenderError::Network(err.to_string())
        }
    }
}

/// Maps a non-success HTTP status to a failure class: server-side trouble
/// and throttling are worth retrying, anything else rejected the message.
pub(crate) fn classify_status(status: StatusCode, context: &str, body: &str) -> SenderError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        SenderError::Network(format!("{context} returned {status}: {body}"))
    } else {
        SenderError::Rejected(format!("{context} returned {status}: {body}"))
    }
}

/// Transport capability for one channel kind.
///
/// Implementations receive the whole opaque credential value and the
/// rendered message; they never see the routing or the raw event payload.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        message: &RenderedMessage,
    ) -> Result<(), SenderError>;
}

/// Maps channel kinds to their senders. A kind with no registered sender
/// fails permanently at dispatch time.
pub struct SenderRegistry {
    senders: HashMap<ChannelKind, Arc<dyn NotificationSender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
        }
    }

    /// Registry with every shipped sender.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ChannelKind::Telegram, Arc::new(telegram::TelegramSender::new()));
        registry.register(ChannelKind::Email, Arc::new(email::EmailSender::new()));
        registry.register(ChannelKind::Slack, Arc::new(slack::SlackSender::new()));
        registry.register(ChannelKind::Webhook, Arc::new(webhook::WebhookSender::new()));
        registry
    }

    pub fn register(&mut self, kind: ChannelKind, sender: Arc<dyn NotificationSender>) {
        self.senders.insert(kind, sender);
    }

    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn NotificationSender>> {
        self.senders.get(&kind).cloned()
    }
}

impl Default for SenderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
