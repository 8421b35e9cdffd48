//! Notifier trait definition and shared error types.

use std::path::PathBuf;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Relay delivery failed: {0}")]
    Relay(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Facts about one completed ingestion, addressed to its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionNotice {
    pub recipients: Vec<String>,
    pub station: String,
    pub label: String,
    /// Where the pulled file was stored on this server.
    pub local_path: PathBuf,
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "email", "relay").
    fn channel_name(&self) -> &str;
}
