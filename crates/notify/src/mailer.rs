//! Turns ingestion notices into rendered notifications on one channel.

use chrono::Local;

use loghaul_core::config::NotifyConfig;

use crate::email::EmailNotifier;
use crate::relay::RelayNotifier;
use crate::templating::{TemplateContext, TemplateRenderer, DEFAULT_BODY, DEFAULT_SUBJECT};
use crate::traits::{IngestionNotice, Notification, Notifier, NotifyError};

/// Renders subject/body for a notice and delivers it through a channel.
pub struct IngestionNotifier {
    channel: Box<dyn Notifier>,
    renderer: TemplateRenderer,
    subject_template: String,
    body_template: String,
}

impl IngestionNotifier {
    /// Use the default subject and body templates.
    pub fn new(channel: Box<dyn Notifier>) -> Self {
        Self {
            channel,
            renderer: TemplateRenderer::new(),
            subject_template: DEFAULT_SUBJECT.to_string(),
            body_template: DEFAULT_BODY.to_string(),
        }
    }

    /// Override the templates, rejecting ones that do not parse.
    pub fn with_templates(
        mut self,
        subject: Option<&str>,
        body: Option<&str>,
    ) -> Result<Self, NotifyError> {
        if let Some(subject) = subject {
            self.renderer.validate(subject)?;
            self.subject_template = subject.to_string();
        }
        if let Some(body) = body {
            self.renderer.validate(body)?;
            self.body_template = body.to_string();
        }
        Ok(self)
    }

    /// Build the configured channel, or `None` when notifications are disabled.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, NotifyError> {
        let channel: Box<dyn Notifier> = match config.channel.as_str() {
            "none" | "" => return Ok(None),
            "smtp" | "email" => {
                let host = config
                    .smtp_host
                    .as_deref()
                    .ok_or_else(|| NotifyError::Config("SMTP_HOST is not set".to_string()))?;
                Box::new(EmailNotifier::from_config(
                    host,
                    Some(config.smtp_port),
                    Some(config.smtp_tls),
                    &config.sender,
                )?)
            }
            "relay" | "zmq" => {
                let endpoint = config.relay_endpoint.as_deref().ok_or_else(|| {
                    NotifyError::Config("NOTIFY_RELAY_ENDPOINT is not set".to_string())
                })?;
                Box::new(RelayNotifier::new(endpoint, config.sender.clone())?)
            }
            other => {
                return Err(NotifyError::Config(format!(
                    "unknown notification channel: {other}"
                )))
            }
        };

        Self::new(channel)
            .with_templates(
                config.subject_template.as_deref(),
                config.body_template.as_deref(),
            )
            .map(Some)
    }

    pub fn channel_name(&self) -> &str {
        self.channel.channel_name()
    }

    /// Render the notification for `notice` without sending it.
    pub fn render(&self, notice: &IngestionNotice) -> Result<Notification, NotifyError> {
        let ctx = TemplateContext::from_notice(notice, Local::now().to_rfc3339());
        Ok(Notification {
            recipients: notice.recipients.clone(),
            subject: self.renderer.render(&self.subject_template, &ctx)?,
            body: self.renderer.render(&self.body_template, &ctx)?,
        })
    }

    /// Send one notification for a completed ingestion.
    ///
    /// A notice without recipients is skipped and reported as delivered.
    pub async fn notify(&self, notice: &IngestionNotice) -> Result<(), NotifyError> {
        if notice.recipients.is_empty() {
            tracing::debug!(label = %notice.label, "no recipients, notification skipped");
            return Ok(());
        }
        let notification = self.render(notice)?;
        self.channel.send(&notification).await
    }
}

impl std::fmt::Debug for IngestionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionNotifier")
            .field("channel", &self.channel.channel_name())
            .finish_non_exhaustive()
    }
}
