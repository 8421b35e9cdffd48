//! Minijinja template rendering for ingestion notifications.
//!
//! Subject and body are arbitrary template strings (configurable per
//! deployment), so a fresh [`minijinja::Environment`] is created per render.

use crate::traits::{IngestionNotice, NotifyError};

/// Default subject line.
pub const DEFAULT_SUBJECT: &str = "Logs Ingestion Notification - {{ label }}";

/// Default message body.
pub const DEFAULT_BODY: &str = "Hi,

The log file has been ingested successfully.

Station: {{ station }}
File: {{ file_name }}
Stored at: {{ local_path }}

Best Regards,
Log Ingestor Service";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub station: String,
    pub label: String,
    /// File name of the stored copy (timestamped).
    pub file_name: String,
    /// Full path of the stored copy.
    pub local_path: String,
    pub recipients: Vec<String>,
    /// Render time in ISO 8601 format.
    pub now: String,
}

impl TemplateContext {
    pub fn from_notice(notice: &IngestionNotice, now: impl Into<String>) -> Self {
        Self {
            station: notice.station.clone(),
            label: notice.label.clone(),
            file_name: notice
                .local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            local_path: notice.local_path.display().to_string(),
            recipients: notice.recipients.clone(),
            now: now.into(),
        }
    }
}

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check that a template string parses, without evaluating it.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}
