//! Wires config into the concrete catalog, channel and notifier.

use std::path::Path;

use tracing::warn;

use loghaul_catalog::CatalogStore;
use loghaul_core::Config;
use loghaul_notify::{IngestionNotifier, NotifyError};
use loghaul_remote::SshChannel;

use crate::job::{JobSettings, ReconcileJob};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("notification setup failed: {0}")]
    Notify(#[from] NotifyError),
}

/// Everything a reconciliation run needs, built once per process.
#[derive(Debug)]
pub struct Runtime {
    pub config: Config,
    pub store: CatalogStore,
    pub channel: SshChannel,
    pub notifier: Option<IngestionNotifier>,
}

impl Runtime {
    pub fn from_config(config: Config) -> Result<Self, RuntimeError> {
        if !Path::new(&config.ssh.key_path).exists() {
            warn!(
                key = %config.ssh.key_path.display(),
                "ssh key not found, remote operations will fail"
            );
        }

        let notifier = IngestionNotifier::from_config(&config.notify)?;
        if notifier.is_none() {
            warn!("notifications disabled (NOTIFY_CHANNEL=none)");
        }

        Ok(Self {
            store: CatalogStore::new(&config.catalog.path),
            channel: SshChannel::from_config(&config.ssh),
            notifier,
            config,
        })
    }

    /// Replace the configured notifier, e.g. to silence a one-off run.
    pub fn without_notifier(mut self) -> Self {
        self.notifier = None;
        self
    }

    pub fn settings(&self) -> JobSettings {
        JobSettings {
            base_dir: self.config.storage.base_dir.clone(),
            size_match: self.config.reconcile.size_match,
        }
    }

    pub fn job(&self) -> ReconcileJob<'_> {
        ReconcileJob::new(&self.store, &self.channel, self.settings())
            .with_notifier(self.notifier.as_ref())
    }
}
