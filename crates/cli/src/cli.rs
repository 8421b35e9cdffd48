use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Pull finished log files from lab stations and notify their owners.
///
/// Entries are registered with `add` and picked up by `run` (usually from
/// cron) once the remote file has reached its expected size.
#[derive(Parser, Debug)]
#[command(name = "loghaul", version, about)]
pub struct CliArgs {
    /// Catalog file (overrides CATALOG_PATH)
    #[arg(long, global = true, env = "CATALOG_PATH")]
    pub catalog: Option<PathBuf>,

    /// Root directory for pulled logs (overrides LOG_BASE_DIR)
    #[arg(long, global = true, env = "LOG_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOGHAUL_LOG_JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one reconciliation pass over the catalog
    Run(RunArgs),
    /// Register or replace a log file to watch
    Add(AddArgs),
    /// List catalog entries, newest ingestion first
    List(ListArgs),
    /// Print one entry as JSON
    Show {
        /// Entry label
        label: String,
    },
    /// Send a sample notification through the configured channel
    TestNotify {
        /// Recipient address (repeatable)
        #[arg(long = "to", required = true)]
        to: Vec<String>,

        /// Label used in the sample subject
        #[arg(long, default_value = "TEST")]
        label: String,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only reconcile this label
    #[arg(long)]
    pub label: Option<String>,

    /// Skip notifications for this run
    #[arg(long)]
    pub no_notify: bool,

    /// Print the run report as JSON instead of a table
    #[arg(long)]
    pub report: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Station the log belongs to (IR, XAFS/XRF, MS/XPD, BEATS, HESEB, TXPES)
    #[arg(long)]
    pub station: String,

    /// Unique label for this entry; an existing label is replaced
    #[arg(long)]
    pub label: String,

    /// Remote login as `user@host` or bare `host` (user defaults to $USER)
    #[arg(long)]
    pub login: String,

    /// Absolute path of the log file on the remote host
    #[arg(long)]
    pub path: String,

    /// Comma separated notification recipients
    #[arg(long, default_value = "")]
    pub emails: String,

    /// Size in MB the file must reach before it is pulled
    #[arg(long, allow_negative_numbers = true)]
    pub size_mb: i64,

    /// Reconcile this entry immediately after storing it
    #[arg(long)]
    pub pull_now: bool,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only entries for this station
    #[arg(long)]
    pub station: Option<String>,

    /// Only entries owned by this remote user
    #[arg(long)]
    pub user: Option<String>,

    /// Only entries whose label contains this text
    #[arg(long)]
    pub label: Option<String>,
}
