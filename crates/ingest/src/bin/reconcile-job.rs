//! reconcile-job: one reconciliation pass over the catalog, for cron.
//!
//! ```text
//! */10 * * * * reconcile-job --json >> /var/log/loghaul.log 2>&1
//! ```
//!
//! Exits 0 even when entries were skipped; skips are reported in the log
//! and retried on the next invocation. Only setup errors exit non-zero.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use loghaul_core::config::{load_dotenv, Config};
use loghaul_ingest::logging::init_tracing;
use loghaul_ingest::Runtime;

// ── CLI ─────────────────────────────────────────────────────────────

/// Pull ready log files from lab stations and notify their owners.
#[derive(Parser, Debug)]
#[command(name = "reconcile-job", version, about)]
struct Cli {
    /// Catalog file (overrides CATALOG_PATH).
    #[arg(long, env = "CATALOG_PATH")]
    catalog: Option<PathBuf>,

    /// Root directory for pulled logs (overrides LOG_BASE_DIR).
    #[arg(long, env = "LOG_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Only reconcile this label.
    #[arg(long)]
    label: Option<String>,

    /// Do not send notifications for this run.
    #[arg(long)]
    no_notify: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOGHAUL_LOG_JSON")]
    json: bool,

    /// Print the run report as JSON on stdout when done.
    #[arg(long)]
    report: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing("info", cli.json);

    let mut config = Config::from_env();
    if let Some(path) = cli.catalog {
        config.catalog.path = path;
    }
    if let Some(dir) = cli.base_dir {
        config.storage.base_dir = dir;
    }
    config.log_summary();

    let mut runtime = Runtime::from_config(config)?;
    if cli.no_notify {
        runtime = runtime.without_notifier();
    }

    let job = runtime.job();
    let report = match cli.label.as_deref() {
        Some(label) => job.run_only(label).await,
        None => job.run().await,
    };

    if cli.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    info!(
        ingested = report.ingested(),
        skipped = report.skipped(),
        "reconcile-job done"
    );
    Ok(())
}
