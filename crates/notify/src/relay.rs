//! Mail-relay notifier over a ZeroMQ PUSH socket.
//!
//! The relay is a separate mail gateway that PULLs five-frame messages:
//! `[sender, recipients, cc, subject, body]`, with recipients joined by `"; "`.
//! A fresh socket is connected per notification; ingestions are infrequent.

use std::time::Duration;

use zeromq::{PushSocket, Socket, SocketSend, ZmqMessage};

use crate::traits::{Notification, Notifier, NotifyError};

/// Pushes notifications to a ZeroMQ mail relay.
#[derive(Debug, Clone)]
pub struct RelayNotifier {
    endpoint: String,
    sender: String,
    send_timeout: Duration,
}

impl RelayNotifier {
    const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

    pub fn new(endpoint: impl Into<String>, sender: impl Into<String>) -> Result<Self, NotifyError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("tcp://") || endpoint.starts_with("ipc://")) {
            return Err(NotifyError::Config(format!(
                "relay endpoint must be tcp:// or ipc://, got {endpoint}"
            )));
        }
        Ok(Self {
            endpoint,
            sender: sender.into(),
            send_timeout: Duration::from_secs(Self::DEFAULT_SEND_TIMEOUT_SECS),
        })
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Frame layout expected by the relay.
    pub fn frames(&self, notification: &Notification) -> [String; 5] {
        [
            self.sender.clone(),
            notification.recipients.join("; "),
            String::new(),
            notification.subject.clone(),
            notification.body.clone(),
        ]
    }

    async fn push(&self, message: ZmqMessage) -> Result<(), NotifyError> {
        let mut socket = PushSocket::new();
        socket
            .connect(&self.endpoint)
            .await
            .map_err(|e| NotifyError::Relay(e.to_string()))?;
        socket
            .send(message)
            .await
            .map_err(|e| NotifyError::Relay(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for RelayNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let [sender, rest @ ..] = self.frames(notification);
        let mut message = ZmqMessage::from(sender);
        for frame in rest {
            message.push_back(frame.into_bytes().into());
        }

        tokio::time::timeout(self.send_timeout, self.push(message))
            .await
            .map_err(|_| {
                NotifyError::Relay(format!(
                    "no relay accepted the message within {:?}",
                    self.send_timeout
                ))
            })??;

        tracing::info!(
            channel = "relay",
            endpoint = %self.endpoint,
            subject = %notification.subject,
            recipients = notification.recipients.len(),
            "notification delivered"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "relay"
    }
}
