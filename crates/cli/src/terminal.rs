use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use loghaul_core::IngestionEntry;
use loghaul_ingest::{EntryOutcome, RunReport};

use crate::commands::Totals;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const OK: Color = Color::Green;
    const SKIP: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Colored output for the `loghaul` subcommands.
#[derive(Debug, Default)]
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// One line per processed entry, then the counters.
    pub fn print_run_report(&self, report: &RunReport) -> Result<()> {
        let mut stdout = io::stdout();
        if report.entries.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("Nothing to reconcile.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        for entry in &report.entries {
            execute!(
                stdout,
                SetForegroundColor(outcome_color(&entry.outcome)),
                Print(format!("{:<16}", entry.outcome.state())),
                ResetColor,
                Print(format!(
                    "{:<24} {:<10} {}\n",
                    truncate(&entry.label, 24),
                    entry.station,
                    outcome_detail(&entry.outcome)
                )),
            )?;
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "{} ingested, {} skipped ({} failed) in {} ms\n",
                report.ingested(),
                report.skipped(),
                report.failed(),
                report.duration_ms
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a catalog listing.
    pub fn print_entries(&self, entries: &[IngestionEntry]) -> Result<()> {
        let mut stdout = io::stdout();
        if entries.is_empty() {
            execute!(
                stdout,
                SetForegroundColor(Colors::DIM),
                Print("No entries found.\n"),
                ResetColor,
            )?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!(
                "{:<24} {:<10} {:<28} {:>8}  {:<25}\n",
                "LABEL", "STATION", "SOURCE", "SIZE MB", "INGESTED"
            )),
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", "-".repeat(100))),
            ResetColor,
        )?;

        for e in entries {
            let source = format!("{}@{}", e.user, e.host);
            let ingested = e.timestamp.as_deref().unwrap_or("pending");
            execute!(
                stdout,
                Print(format!(
                    "{:<24} {:<10} {:<28} {:>8}  ",
                    truncate(&e.label, 24),
                    e.station,
                    truncate(&source, 28),
                    e.expected_size_mb,
                )),
                SetForegroundColor(if e.timestamp.is_some() {
                    Colors::OK
                } else {
                    Colors::DIM
                }),
                Print(format!("{ingested}\n")),
                ResetColor,
            )?;
        }

        stdout.flush()?;
        Ok(())
    }

    pub fn print_totals(&self, totals: &Totals) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "{} entries, {} stations, {} MB total\n",
                totals.entries, totals.stations, totals.total_mb
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_success(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::OK),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }
}

fn outcome_color(outcome: &EntryOutcome) -> Color {
    if outcome.is_ingested() {
        Colors::OK
    } else if outcome.is_failure() {
        Colors::ERROR
    } else {
        Colors::SKIP
    }
}

fn outcome_detail(outcome: &EntryOutcome) -> String {
    match outcome {
        EntryOutcome::Invalid { missing } => format!("missing: {}", missing.join(", ")),
        EntryOutcome::Malformed { error }
        | EntryOutcome::ProbeFailed { error }
        | EntryOutcome::TransferFailed { error } => error.clone(),
        EntryOutcome::FileNotFound => "remote file not present".to_string(),
        EntryOutcome::SizeMismatch {
            remote_mb,
            expected_mb,
        } => format!("{remote_mb} MB of {expected_mb} MB"),
        EntryOutcome::Ingested {
            local_path,
            persisted,
            notified,
            ..
        } => {
            let mut detail = local_path.display().to_string();
            if !persisted {
                detail.push_str(" (catalog not saved)");
            }
            if *notified {
                detail.push_str(" (notified)");
            }
            detail
        }
    }
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
