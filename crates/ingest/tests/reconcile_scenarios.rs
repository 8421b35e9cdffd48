//! End-to-end reconciliation scenarios against an in-memory remote and a
//! real catalog file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use serde_json::Value;
use tempfile::TempDir;

use loghaul_catalog::CatalogStore;
use loghaul_core::{IngestionEntry, RemoteTarget, SizeMatch, BYTES_PER_MB};
use loghaul_ingest::{EntryOutcome, FixedClock, JobSettings, ReconcileJob};
use loghaul_notify::{IngestionNotifier, Notification, Notifier, NotifyError};
use loghaul_remote::{RemoteError, RemoteFileChannel};

// ── Fakes ───────────────────────────────────────────────────────────

/// Remote files keyed by `host:path`. A successful transfer writes the
/// destination and removes the source, like `rsync --remove-source-files`.
#[derive(Default)]
struct FakeRemote {
    files: Mutex<HashMap<String, u64>>,
    failing_transfers: HashSet<String>,
    transfers: AtomicUsize,
}

impl FakeRemote {
    fn with_file(self, host: &str, path: &str, bytes: u64) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(format!("{host}:{path}"), bytes);
        self
    }

    fn failing(mut self, host: &str, path: &str) -> Self {
        self.failing_transfers.insert(format!("{host}:{path}"));
        self
    }

    fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }
}

fn key(target: &RemoteTarget) -> String {
    format!("{}:{}", target.host, target.path)
}

#[async_trait]
impl RemoteFileChannel for FakeRemote {
    async fn probe(&self, target: &RemoteTarget) -> Result<Option<u64>, RemoteError> {
        Ok(self.files.lock().unwrap().get(&key(target)).copied())
    }

    async fn transfer(&self, target: &RemoteTarget, dest: &Path) -> Result<(), RemoteError> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        if self.failing_transfers.contains(&key(target)) {
            return Err(RemoteError::Command {
                program: "rsync".to_string(),
                code: 23,
                stderr: "partial transfer".to_string(),
            });
        }
        let bytes = self
            .files
            .lock()
            .unwrap()
            .remove(&key(target))
            .ok_or_else(|| RemoteError::InvalidOutput("vanished".to_string()))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, vec![b'x'; bytes as usize])?;
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "fake"
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(NotifyError::Smtp("connection refused".to_string()));
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

struct Fixture {
    _tmp: TempDir,
    store: CatalogStore,
    base_dir: PathBuf,
    clock: FixedClock,
}

impl Fixture {
    fn new(entries: &[IngestionEntry]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(tmp.path().join("labels.json"));
        store.save(entries).unwrap();
        let base_dir = tmp.path().join("logs");
        Self {
            _tmp: tmp,
            store,
            base_dir,
            clock: FixedClock(Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        }
    }

    fn settings(&self, size_match: SizeMatch) -> JobSettings {
        JobSettings {
            base_dir: self.base_dir.clone(),
            size_match,
        }
    }

    fn job<'a>(&'a self, remote: &'a FakeRemote) -> ReconcileJob<'a> {
        ReconcileJob::new(&self.store, remote, self.settings(SizeMatch::Exact))
            .with_clock(&self.clock)
    }

    fn raw(&self) -> Vec<u8> {
        std::fs::read(self.store.path()).unwrap()
    }
}

fn entry(label: &str, host: &str, path: &str, size_mb: u64) -> IngestionEntry {
    IngestionEntry {
        station: "IR".to_string(),
        label: label.to_string(),
        user: "ubuntu".to_string(),
        host: host.to_string(),
        remote_path: path.to_string(),
        recipients: vec!["owner@example.org".to_string()],
        expected_size_mb: size_mb,
        timestamp: None,
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn absent_file_is_skipped_and_catalog_unchanged() {
    let fx = Fixture::new(&[entry("A", "10.0.0.1", "/var/log/a.log", 5)]);
    let before = fx.raw();
    let remote = FakeRemote::default();

    let report = fx.job(&remote).run().await;

    assert_eq!(report.outcome_for("A"), Some(&EntryOutcome::FileNotFound));
    assert_eq!(remote.transfer_count(), 0);
    assert_eq!(fx.raw(), before);
}

#[tokio::test]
async fn undersized_file_is_not_transferred() {
    let fx = Fixture::new(&[entry("A", "10.0.0.1", "/var/log/a.log", 5)]);
    let before = fx.raw();
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", 3 * BYTES_PER_MB);

    let report = fx.job(&remote).run().await;

    assert_eq!(
        report.outcome_for("A"),
        Some(&EntryOutcome::SizeMismatch {
            remote_mb: 3,
            expected_mb: 5
        })
    );
    assert_eq!(remote.transfer_count(), 0);
    assert_eq!(fx.raw(), before);
}

#[tokio::test]
async fn matching_file_is_ingested_stamped_and_notified() {
    let fx = Fixture::new(&[entry("A", "10.0.0.1", "/var/log/a.log", 5)]);
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", 5 * BYTES_PER_MB);
    let recorder = RecordingNotifier::default();
    let notifier = IngestionNotifier::new(Box::new(recorder.clone()));

    let report = fx
        .job(&remote)
        .with_notifier(Some(&notifier))
        .run()
        .await;

    let expected_dest = fx.base_dir.join("IR").join("a_20240102_030405.log");
    match report.outcome_for("A") {
        Some(EntryOutcome::Ingested {
            local_path,
            persisted,
            notified,
            ..
        }) => {
            assert_eq!(local_path, &expected_dest);
            assert!(persisted);
            assert!(notified);
        }
        other => panic!("expected ingestion, got {other:?}"),
    }
    assert!(expected_dest.exists());

    let saved = fx.store.load();
    let stamp = saved[0].timestamp.as_deref().unwrap();
    assert!(stamp.starts_with("2024-01-02T03:04:05"), "got: {stamp}");

    let sent = recorder.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients, vec!["owner@example.org"]);
    assert_eq!(sent[0].subject, "Logs Ingestion Notification - A");
}

#[tokio::test]
async fn only_the_ingested_entry_is_mutated() {
    let fx = Fixture::new(&[]);
    std::fs::write(
        fx.store.path(),
        r#"[
    {
        "label": "NOSTATION",
        "user": "ubuntu",
        "ip_address": "10.0.0.1",
        "log_file_path": "/var/log/a.log",
        "note": "keep me"
    },
    {
        "station": "IR",
        "label": "B",
        "user": "ubuntu",
        "ip_address": "10.0.0.2",
        "log_file_path": "/var/log/b.log",
        "email_to": ["owner@example.org"],
        "log_size_mb": 5,
        "added_by": "form"
    },
    {
        "station": "HESEB",
        "label": "C",
        "user": "ubuntu",
        "ip_address": "10.0.0.3",
        "log_file_path": "/var/log/c.log",
        "log_size_mb": 5
    }
]"#,
    )
    .unwrap();
    let before: Vec<Value> = serde_json::from_slice(&fx.raw()).unwrap();
    let remote = FakeRemote::default()
        .with_file("10.0.0.1", "/var/log/a.log", 5 * BYTES_PER_MB)
        .with_file("10.0.0.2", "/var/log/b.log", 5 * BYTES_PER_MB);

    let report = fx.job(&remote).run().await;
    assert!(report.outcome_for("B").unwrap().is_ingested());

    let after: Vec<Value> = serde_json::from_slice(&fx.raw()).unwrap();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);

    let mut stamped = after[1].as_object().unwrap().clone();
    assert!(stamped.remove("timestamp").unwrap().is_string());
    assert_eq!(Value::Object(stamped), before[1]);
    assert_eq!(after[1]["added_by"], "form");
}

#[tokio::test]
async fn null_field_row_does_not_hide_the_rest() {
    let fx = Fixture::new(&[]);
    std::fs::write(
        fx.store.path(),
        r#"[
    {"station": null, "label": "BAD", "user": "ubuntu", "ip_address": "10.0.0.1",
     "log_file_path": "/var/log/a.log", "email_to": null, "log_size_mb": 1},
    {"station": "IR", "label": "GOOD", "user": "ubuntu", "ip_address": "10.0.0.2",
     "log_file_path": "/var/log/b.log", "email_to": [], "log_size_mb": 1}
]"#,
    )
    .unwrap();
    let remote = FakeRemote::default()
        .with_file("10.0.0.1", "/var/log/a.log", BYTES_PER_MB)
        .with_file("10.0.0.2", "/var/log/b.log", BYTES_PER_MB);

    let report = fx.job(&remote).run().await;

    assert_eq!(report.entries.len(), 2);
    assert_eq!(
        report.outcome_for("BAD"),
        Some(&EntryOutcome::Invalid {
            missing: vec!["station"]
        })
    );
    assert!(report.outcome_for("GOOD").unwrap().is_ingested());

    let rows: Vec<Value> = serde_json::from_slice(&fx.raw()).unwrap();
    assert_eq!(rows[0]["station"], Value::Null);
    assert_eq!(rows[0]["email_to"], Value::Null);
    assert!(rows[0].get("timestamp").is_none());
}

#[tokio::test]
async fn mistyped_row_is_skipped_and_preserved() {
    let fx = Fixture::new(&[]);
    std::fs::write(
        fx.store.path(),
        r#"[
    {"station": "IR", "label": "TYPO", "user": "ubuntu", "ip_address": "10.0.0.1",
     "log_file_path": "/var/log/a.log", "log_size_mb": "five"},
    {"station": "IR", "label": "GOOD", "user": "ubuntu", "ip_address": "10.0.0.2",
     "log_file_path": "/var/log/b.log", "log_size_mb": 1}
]"#,
    )
    .unwrap();
    let remote = FakeRemote::default()
        .with_file("10.0.0.1", "/var/log/a.log", BYTES_PER_MB)
        .with_file("10.0.0.2", "/var/log/b.log", BYTES_PER_MB);

    let report = fx.job(&remote).run().await;

    assert!(matches!(
        report.outcome_for("TYPO"),
        Some(EntryOutcome::Malformed { .. })
    ));
    assert!(report.outcome_for("GOOD").unwrap().is_ingested());
    assert_eq!(remote.transfer_count(), 1);

    let rows: Vec<Value> = serde_json::from_slice(&fx.raw()).unwrap();
    assert_eq!(rows[0]["log_size_mb"], "five");
    assert!(rows[0].get("timestamp").is_none());
}

#[tokio::test]
async fn malformed_catalog_processes_nothing() {
    let fx = Fixture::new(&[]);
    std::fs::write(fx.store.path(), b"{ not json").unwrap();
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", BYTES_PER_MB);

    let report = fx.job(&remote).run().await;

    assert!(report.entries.is_empty());
    assert_eq!(remote.transfer_count(), 0);
    assert_eq!(fx.raw(), b"{ not json");
}

#[tokio::test]
async fn missing_station_is_skipped_and_file_byte_identical() {
    let fx = Fixture::new(&[]);
    let raw = br#"[
    {
        "label": "NOSTATION",
        "user": "ubuntu",
        "ip_address": "10.0.0.1",
        "log_file_path": "/var/log/a.log",
        "email_to": [],
        "log_size_mb": 1
    }
]"#;
    std::fs::write(fx.store.path(), raw).unwrap();
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", BYTES_PER_MB);

    let report = fx.job(&remote).run().await;

    assert_eq!(
        report.outcome_for("NOSTATION"),
        Some(&EntryOutcome::Invalid {
            missing: vec!["station"]
        })
    );
    assert_eq!(remote.transfer_count(), 0);
    assert_eq!(fx.raw(), raw.to_vec());
}

#[tokio::test]
async fn second_run_does_not_reingest() {
    let fx = Fixture::new(&[entry("A", "10.0.0.1", "/var/log/a.log", 5)]);
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", 5 * BYTES_PER_MB);

    let first = fx.job(&remote).run().await;
    let stamped = fx.raw();
    let second = fx.job(&remote).run().await;

    assert_eq!(first.ingested(), 1);
    assert_eq!(second.ingested(), 0);
    assert_eq!(second.outcome_for("A"), Some(&EntryOutcome::FileNotFound));
    assert_eq!(remote.transfer_count(), 1);
    assert_eq!(fx.raw(), stamped);
}

#[tokio::test]
async fn transfer_failure_does_not_stop_the_run() {
    let fx = Fixture::new(&[
        entry("A", "10.0.0.1", "/var/log/a.log", 1),
        entry("B", "10.0.0.2", "/var/log/b.log", 1),
    ]);
    let remote = FakeRemote::default()
        .with_file("10.0.0.1", "/var/log/a.log", BYTES_PER_MB)
        .with_file("10.0.0.2", "/var/log/b.log", BYTES_PER_MB)
        .failing("10.0.0.1", "/var/log/a.log");

    let report = fx.job(&remote).run().await;

    assert!(matches!(
        report.outcome_for("A"),
        Some(EntryOutcome::TransferFailed { .. })
    ));
    assert!(report.outcome_for("B").unwrap().is_ingested());

    let saved = fx.store.load();
    assert!(saved[0].timestamp.is_none());
    assert!(saved[1].timestamp.is_some());
}

#[tokio::test]
async fn notification_failure_keeps_the_ingestion() {
    let fx = Fixture::new(&[entry("A", "10.0.0.1", "/var/log/a.log", 1)]);
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", BYTES_PER_MB);
    let recorder = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let notifier = IngestionNotifier::new(Box::new(recorder.clone()));

    let report = fx
        .job(&remote)
        .with_notifier(Some(&notifier))
        .run()
        .await;

    assert!(matches!(
        report.outcome_for("A"),
        Some(EntryOutcome::Ingested {
            persisted: true,
            notified: false,
            ..
        })
    ));
    assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    assert!(fx.store.load()[0].timestamp.is_some());
}

#[tokio::test]
async fn at_least_policy_pulls_grown_files() {
    let fx = Fixture::new(&[entry("A", "10.0.0.1", "/var/log/a.log", 5)]);
    let remote = FakeRemote::default().with_file("10.0.0.1", "/var/log/a.log", 9 * BYTES_PER_MB);

    let report = ReconcileJob::new(&fx.store, &remote, fx.settings(SizeMatch::AtLeast))
        .with_clock(&fx.clock)
        .run()
        .await;

    assert!(report.outcome_for("A").unwrap().is_ingested());
    assert_eq!(remote.transfer_count(), 1);
}

#[tokio::test]
async fn slash_station_lands_in_flattened_directory() {
    let mut e = entry("X", "10.0.0.1", "/data/scan.dat", 1);
    e.station = "XAFS/XRF".to_string();
    let fx = Fixture::new(&[e]);
    let remote = FakeRemote::default().with_file("10.0.0.1", "/data/scan.dat", BYTES_PER_MB);

    fx.job(&remote).run().await;

    assert!(fx
        .base_dir
        .join("XAFS__XRF")
        .join("scan_20240102_030405.dat")
        .exists());
}
