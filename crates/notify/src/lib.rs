//! Notifications for completed log ingestions.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - SMTP email and ZeroMQ mail-relay notifier implementations
//! - Minijinja template rendering for notification messages
//! - `IngestionNotifier`, which renders a notice and sends it on one channel

pub mod email;
pub mod mailer;
pub mod relay;
pub mod templating;
pub mod traits;

pub use mailer::IngestionNotifier;
pub use traits::{IngestionNotice, Notification, Notifier, NotifyError};
