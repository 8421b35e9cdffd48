//! Subcommand implementations.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tracing::info;

use loghaul_catalog::{CatalogStore, Upsert};
use loghaul_core::entry::{split_login, split_recipients};
use loghaul_core::{Config, IngestionEntry, NewEntry};
use loghaul_ingest::Runtime;
use loghaul_notify::{IngestionNotice, IngestionNotifier};

use crate::cli::{AddArgs, ListArgs, RunArgs};
use crate::terminal::Terminal;

// ── run ─────────────────────────────────────────────────────────────

pub async fn run(config: Config, args: RunArgs, terminal: &Terminal) -> Result<()> {
    let mut runtime = Runtime::from_config(config)?;
    if args.no_notify {
        runtime = runtime.without_notifier();
    }

    let job = runtime.job();
    let report = match args.label.as_deref() {
        Some(label) => job.run_only(label).await,
        None => job.run().await,
    };

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        terminal.print_run_report(&report)?;
    }
    Ok(())
}

// ── add ─────────────────────────────────────────────────────────────

/// Turn `add` arguments into a validated entry. `os_user` fills in the
/// remote user when the login has no `user@` part.
pub fn build_entry(args: &AddArgs, os_user: &str) -> Result<IngestionEntry> {
    let (user, host) = split_login(args.login.trim());
    let draft = NewEntry {
        station: args.station.clone(),
        label: args.label.clone(),
        user: user.unwrap_or(os_user).to_string(),
        host: host.to_string(),
        remote_path: args.path.clone(),
        recipients: split_recipients(&args.emails),
        expected_size_mb: args.size_mb,
    };
    draft.validate().context("invalid entry")
}

fn os_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

pub async fn add(config: Config, args: AddArgs, terminal: &Terminal) -> Result<()> {
    let entry = build_entry(&args, &os_user())?;
    let label = entry.label.clone();

    let store = CatalogStore::new(&config.catalog.path);
    let outcome = store.upsert(entry).with_context(|| {
        format!(
            "refusing to modify catalog {}",
            config.catalog.path.display()
        )
    })?;
    match outcome {
        Upsert::Inserted => terminal.print_success(&format!("Added {label}"))?,
        Upsert::Updated => terminal.print_success(&format!("Replaced {label}"))?,
    }

    if args.pull_now {
        info!(%label, "pulling immediately");
        let runtime = Runtime::from_config(config)?;
        let report = runtime.job().run_only(&label).await;
        terminal.print_run_report(&report)?;
    }
    Ok(())
}

// ── list / show ─────────────────────────────────────────────────────

/// Aggregates shown under `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    pub entries: usize,
    pub stations: usize,
    pub total_mb: u64,
}

impl Totals {
    pub fn of(entries: &[IngestionEntry]) -> Self {
        let stations: BTreeSet<&str> = entries.iter().map(|e| e.station.as_str()).collect();
        Self {
            entries: entries.len(),
            stations: stations.len(),
            total_mb: entries.iter().map(|e| e.expected_size_mb).sum(),
        }
    }
}

/// Apply `list` filters, then order by ingestion time, newest first.
///
/// Entries that were never ingested come last, most recently added first.
pub fn select_entries(mut entries: Vec<IngestionEntry>, filter: &ListArgs) -> Vec<IngestionEntry> {
    entries.retain(|e| {
        filter
            .station
            .as_deref()
            .map_or(true, |s| e.station.eq_ignore_ascii_case(s))
            && filter.user.as_deref().map_or(true, |u| e.user == u)
            && filter
                .label
                .as_deref()
                .map_or(true, |l| e.label.to_lowercase().contains(&l.to_lowercase()))
    });
    entries.reverse();
    entries.sort_by_cached_key(|e| {
        let ts = e.timestamp.clone();
        std::cmp::Reverse((ts.as_deref().and_then(parse_timestamp), ts))
    });
    entries
}

/// Read a catalog timestamp as an instant. Values without an offset are
/// local time. Anything unparseable sorts below every parseable value and
/// falls back to string order among itself.
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn list(config: &Config, args: &ListArgs, terminal: &Terminal) -> Result<()> {
    let store = CatalogStore::new(&config.catalog.path);
    let entries = select_entries(store.try_load()?, args);
    terminal.print_entries(&entries)?;
    terminal.print_totals(&Totals::of(&entries))?;
    Ok(())
}

pub fn show(config: &Config, label: &str) -> Result<()> {
    let store = CatalogStore::new(&config.catalog.path);
    let entry = store
        .find(label)?
        .with_context(|| format!("no entry labelled {label}"))?;
    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

// ── test-notify ─────────────────────────────────────────────────────

pub async fn test_notify(
    config: &Config,
    to: Vec<String>,
    label: String,
    terminal: &Terminal,
) -> Result<()> {
    let notifier = IngestionNotifier::from_config(&config.notify)?
        .context("notifications are disabled (set NOTIFY_CHANNEL)")?;

    let notice = IngestionNotice {
        recipients: to,
        station: "TEST".to_string(),
        label,
        local_path: config.storage.base_dir.join("TEST").join("sample.log"),
    };
    notifier.notify(&notice).await?;
    terminal.print_success(&format!(
        "Sample notification sent via {}",
        notifier.channel_name()
    ))?;
    Ok(())
}
