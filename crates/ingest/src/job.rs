//! The reconciliation job: one sequential pass over the catalog.
//!
//! For each entry, in catalog order:
//!
//! ```text
//! malformed row         -> skip
//! invalid fields        -> skip
//! probe error           -> skip
//! remote file absent    -> skip
//! size does not match   -> skip
//! transfer fails        -> skip
//! transfer succeeds     -> stamp entry, save catalog, notify
//! ```
//!
//! Skipped entries are left untouched and reconsidered on the next run.
//! Nothing in a run is fatal; every skip is logged.

use std::path::PathBuf;
use std::time::Instant;

use chrono::SecondsFormat;
use tracing::{error, info, warn};

use loghaul_catalog::{Catalog, CatalogStore};
use loghaul_core::{destination_path, size_mb, SizeMatch};
use loghaul_notify::{IngestionNotice, IngestionNotifier};
use loghaul_remote::RemoteFileChannel;

use crate::clock::{Clock, SystemClock};
use crate::report::{EntryOutcome, RunReport};

static SYSTEM_CLOCK: SystemClock = SystemClock;

#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Root for pulled files, one directory per station.
    pub base_dir: PathBuf,
    pub size_match: SizeMatch,
}

pub struct ReconcileJob<'a> {
    store: &'a CatalogStore,
    channel: &'a dyn RemoteFileChannel,
    notifier: Option<&'a IngestionNotifier>,
    clock: &'a dyn Clock,
    settings: JobSettings,
}

impl<'a> ReconcileJob<'a> {
    pub fn new(
        store: &'a CatalogStore,
        channel: &'a dyn RemoteFileChannel,
        settings: JobSettings,
    ) -> Self {
        Self {
            store,
            channel,
            notifier: None,
            clock: &SYSTEM_CLOCK,
            settings,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<&'a IngestionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Reconcile every entry in the catalog.
    pub async fn run(&self) -> RunReport {
        self.run_filtered(None).await
    }

    /// Reconcile only the entry with `label`, leaving the rest untouched.
    pub async fn run_only(&self, label: &str) -> RunReport {
        self.run_filtered(Some(label)).await
    }

    async fn run_filtered(&self, only: Option<&str>) -> RunReport {
        let started = Instant::now();
        let mut catalog = self.store.load_catalog();
        let mut report = RunReport::default();

        info!(
            catalog = %self.store.path().display(),
            entries = catalog.len(),
            channel = self.channel.channel_name(),
            size_match = %self.settings.size_match,
            "reconciliation run started"
        );

        for idx in 0..catalog.len() {
            let entry = catalog.rows()[idx].entry().clone();
            if only.is_some_and(|label| entry.label != label) {
                continue;
            }
            let outcome = self.reconcile_entry(idx, &mut catalog).await;
            report.push(&entry.label, &entry.station, outcome);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            processed = report.entries.len(),
            ingested = report.ingested(),
            skipped = report.skipped(),
            failed = report.failed(),
            duration_ms = report.duration_ms,
            "reconciliation run finished"
        );
        report
    }

    /// Run the decision procedure for row `idx`, mutating only its
    /// timestamp and only after a successful transfer.
    async fn reconcile_entry(&self, idx: usize, catalog: &mut Catalog) -> EntryOutcome {
        let row = &catalog.rows()[idx];
        if let Some(error) = row.parse_error() {
            warn!(index = idx, label = %row.entry().label, error, "entry malformed, skipping");
            return EntryOutcome::Malformed {
                error: error.to_string(),
            };
        }
        let entry = row.entry().clone();

        let missing = entry.missing_fields();
        if !missing.is_empty() {
            warn!(index = idx, label = %entry.label, ?missing, "entry invalid, skipping");
            return EntryOutcome::Invalid { missing };
        }

        let target = entry.target();
        let size_bytes = match self.channel.probe(&target).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!(label = %entry.label, %target, "file not found, skipping");
                return EntryOutcome::FileNotFound;
            }
            Err(e) => {
                warn!(label = %entry.label, %target, error = %e, "probe failed, skipping");
                return EntryOutcome::ProbeFailed {
                    error: e.to_string(),
                };
            }
        };

        let remote_mb = size_mb(size_bytes);
        if !self
            .settings
            .size_match
            .matches(remote_mb, entry.expected_size_mb)
        {
            warn!(
                label = %entry.label,
                %target,
                remote_mb,
                expected_mb = entry.expected_size_mb,
                "size mismatch, skipping"
            );
            return EntryOutcome::SizeMismatch {
                remote_mb,
                expected_mb: entry.expected_size_mb,
            };
        }

        let now = self.clock.now();
        let dest = destination_path(
            &self.settings.base_dir,
            &entry.station,
            &entry.remote_path,
            &now.naive_local(),
        );

        if let Err(e) = self.channel.transfer(&target, &dest).await {
            error!(label = %entry.label, %target, error = %e, "transfer failed, skipping");
            return EntryOutcome::TransferFailed {
                error: e.to_string(),
            };
        }

        let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, false);
        catalog.set_timestamp(idx, &timestamp);
        info!(
            label = %entry.label,
            station = %entry.station,
            dest = %dest.display(),
            "ingested"
        );

        let persisted = match self.store.save_catalog(catalog) {
            Ok(()) => true,
            Err(e) => {
                error!(label = %entry.label, error = %e, "failed to persist catalog after ingestion");
                false
            }
        };

        let notified = match self.notifier {
            Some(notifier) => {
                let notice = IngestionNotice {
                    recipients: entry.recipients.clone(),
                    station: entry.station.clone(),
                    label: entry.label.clone(),
                    local_path: dest.clone(),
                };
                match notifier.notify(&notice).await {
                    Ok(()) => !notice.recipients.is_empty(),
                    Err(e) => {
                        warn!(
                            label = %entry.label,
                            channel = notifier.channel_name(),
                            error = %e,
                            "notification failed"
                        );
                        false
                    }
                }
            }
            None => false,
        };

        EntryOutcome::Ingested {
            local_path: dest,
            timestamp,
            persisted,
            notified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{Local, TimeZone};
    use loghaul_core::{IngestionEntry, RemoteTarget, BYTES_PER_MB};
    use loghaul_remote::RemoteError;

    use crate::clock::FixedClock;

    #[derive(Default)]
    struct MockChannel {
        sizes: HashMap<String, Result<Option<u64>, String>>,
        probes: AtomicUsize,
        transfers: Mutex<Vec<PathBuf>>,
    }

    #[async_trait::async_trait]
    impl RemoteFileChannel for MockChannel {
        async fn probe(&self, target: &RemoteTarget) -> Result<Option<u64>, RemoteError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            match self.sizes.get(&target.path) {
                Some(Ok(size)) => Ok(*size),
                Some(Err(msg)) => Err(RemoteError::Connection {
                    host: target.host.clone(),
                    message: msg.clone(),
                }),
                None => Ok(None),
            }
        }

        async fn transfer(&self, _target: &RemoteTarget, dest: &Path) -> Result<(), RemoteError> {
            self.transfers.lock().unwrap().push(dest.to_path_buf());
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "mock"
        }
    }

    fn entry(label: &str, path: &str, size: u64) -> IngestionEntry {
        IngestionEntry {
            station: "IR".to_string(),
            label: label.to_string(),
            user: "u".to_string(),
            host: "10.0.0.5".to_string(),
            remote_path: path.to_string(),
            recipients: vec![],
            expected_size_mb: size,
            timestamp: None,
        }
    }

    fn settings() -> JobSettings {
        JobSettings {
            base_dir: PathBuf::from("/srv/logs"),
            size_match: SizeMatch::Exact,
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    #[tokio::test]
    async fn unreachable_host_skips_without_transfer() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        store.save(&[entry("a", "/a.log", 5)]).unwrap();

        let mut channel = MockChannel::default();
        channel
            .sizes
            .insert("/a.log".to_string(), Err("Permission denied".to_string()));

        let report = ReconcileJob::new(&store, &channel, settings()).run().await;
        assert!(matches!(
            report.outcome_for("a"),
            Some(EntryOutcome::ProbeFailed { error }) if error.contains("Permission denied")
        ));
        assert!(channel.transfers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn entries_are_processed_in_catalog_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        store
            .save(&[entry("z", "/z.log", 1), entry("a", "/a.log", 1), entry("m", "/m.log", 1)])
            .unwrap();

        let channel = MockChannel::default();
        let report = ReconcileJob::new(&store, &channel, settings()).run().await;
        let labels: Vec<_> = report.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["z", "a", "m"]);
        assert_eq!(channel.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_only_touches_one_label() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        store
            .save(&[entry("a", "/a.log", 2), entry("b", "/b.log", 2)])
            .unwrap();

        let mut channel = MockChannel::default();
        channel.sizes.insert("/a.log".to_string(), Ok(Some(2 * BYTES_PER_MB)));
        channel.sizes.insert("/b.log".to_string(), Ok(Some(2 * BYTES_PER_MB)));

        let clock = clock();
        let report = ReconcileJob::new(&store, &channel, settings())
            .with_clock(&clock)
            .run_only("b")
            .await;

        assert_eq!(report.entries.len(), 1);
        assert!(report.outcome_for("b").unwrap().is_ingested());
        let saved = store.load();
        assert!(saved[0].timestamp.is_none());
        assert!(saved[1].timestamp.is_some());
    }

    #[tokio::test]
    async fn destination_uses_clock_and_station() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        let mut e = entry("x", "/var/log/log.txt", 1);
        e.station = "MS/XPD".to_string();
        store.save(&[e]).unwrap();

        let mut channel = MockChannel::default();
        channel.sizes.insert("/var/log/log.txt".to_string(), Ok(Some(BYTES_PER_MB + 10)));

        let clock = clock();
        ReconcileJob::new(&store, &channel, settings())
            .with_clock(&clock)
            .run()
            .await;

        let transfers = channel.transfers.lock().unwrap();
        assert_eq!(
            transfers.as_slice(),
            &[PathBuf::from("/srv/logs/MS__XPD/log_20240102_030405.txt")]
        );
        let stamp = store.load()[0].timestamp.clone().unwrap();
        assert!(stamp.starts_with("2024-01-02T03:04:05"), "got: {stamp}");
    }

    #[tokio::test]
    async fn at_least_policy_accepts_larger_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        store.save(&[entry("a", "/a.log", 5)]).unwrap();

        let mut channel = MockChannel::default();
        channel.sizes.insert("/a.log".to_string(), Ok(Some(7 * BYTES_PER_MB)));

        let exact = ReconcileJob::new(&store, &channel, settings()).run().await;
        assert!(matches!(
            exact.outcome_for("a"),
            Some(EntryOutcome::SizeMismatch { remote_mb: 7, expected_mb: 5 })
        ));

        let lenient = JobSettings {
            size_match: SizeMatch::AtLeast,
            ..settings()
        };
        let report = ReconcileJob::new(&store, &channel, lenient).run().await;
        assert!(report.outcome_for("a").unwrap().is_ingested());
    }

    #[tokio::test]
    async fn save_failure_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("labels.json");
        let store = CatalogStore::new(&path);
        store.save(&[entry("a", "/a.log", 1), entry("b", "/b.log", 1)]).unwrap();

        struct ClobberingChannel(PathBuf);

        #[async_trait::async_trait]
        impl RemoteFileChannel for ClobberingChannel {
            async fn probe(&self, _t: &RemoteTarget) -> Result<Option<u64>, RemoteError> {
                Ok(Some(BYTES_PER_MB))
            }
            async fn transfer(&self, _t: &RemoteTarget, _d: &Path) -> Result<(), RemoteError> {
                // Replace the catalog file with a directory so the save fails.
                let _ = std::fs::remove_file(&self.0);
                std::fs::create_dir_all(&self.0).map_err(RemoteError::Io)
            }
            fn channel_name(&self) -> &str {
                "clobber"
            }
        }

        let channel = ClobberingChannel(path.clone());
        let report = ReconcileJob::new(&store, &channel, settings()).run().await;

        assert_eq!(report.entries.len(), 2);
        for e in &report.entries {
            assert!(matches!(e.outcome, EntryOutcome::Ingested { persisted: false, .. }));
        }
    }

    #[tokio::test]
    async fn notify_reports_delivery() {
        use loghaul_notify::{Notification, Notifier, NotifyError};

        struct Counting(Arc<AtomicUsize>);

        #[async_trait::async_trait]
        impl Notifier for Counting {
            async fn send(&self, _n: &Notification) -> Result<(), NotifyError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn channel_name(&self) -> &str {
                "counting"
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        let mut with_recipients = entry("a", "/a.log", 1);
        with_recipients.recipients = vec!["a@example.org".to_string()];
        store.save(&[with_recipients, entry("b", "/b.log", 1)]).unwrap();

        let mut channel = MockChannel::default();
        channel.sizes.insert("/a.log".to_string(), Ok(Some(BYTES_PER_MB)));
        channel.sizes.insert("/b.log".to_string(), Ok(Some(BYTES_PER_MB)));

        let count = Arc::new(AtomicUsize::new(0));
        let notifier = IngestionNotifier::new(Box::new(Counting(count.clone())));
        let report = ReconcileJob::new(&store, &channel, settings())
            .with_notifier(Some(&notifier))
            .run()
            .await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            report.outcome_for("a"),
            Some(EntryOutcome::Ingested { notified: true, .. })
        ));
        assert!(matches!(
            report.outcome_for("b"),
            Some(EntryOutcome::Ingested { notified: false, .. })
        ));
    }
}
