use std::path::PathBuf;

use serde::Serialize;

/// Terminal state of one entry in one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Required fields are blank; the entry was not looked at further.
    Invalid { missing: Vec<&'static str> },
    /// The catalog row has a field of the wrong type.
    Malformed { error: String },
    /// The remote host could not be queried.
    ProbeFailed { error: String },
    /// The remote file does not exist (or was already pulled).
    FileNotFound,
    /// The remote file exists but its size does not match yet.
    SizeMismatch { remote_mb: u64, expected_mb: u64 },
    /// The pull itself failed; nothing was recorded.
    TransferFailed { error: String },
    /// The file was pulled and the entry timestamped.
    Ingested {
        local_path: PathBuf,
        timestamp: String,
        /// Whether the catalog write after the pull succeeded.
        persisted: bool,
        /// Whether a notification was delivered.
        notified: bool,
    },
}

impl EntryOutcome {
    pub fn state(&self) -> &'static str {
        match self {
            EntryOutcome::Invalid { .. } => "invalid",
            EntryOutcome::Malformed { .. } => "malformed",
            EntryOutcome::ProbeFailed { .. } => "probe_failed",
            EntryOutcome::FileNotFound => "file_not_found",
            EntryOutcome::SizeMismatch { .. } => "size_mismatch",
            EntryOutcome::TransferFailed { .. } => "transfer_failed",
            EntryOutcome::Ingested { .. } => "ingested",
        }
    }

    pub fn is_ingested(&self) -> bool {
        matches!(self, EntryOutcome::Ingested { .. })
    }

    /// Failures that point at a problem rather than a file that is not ready.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EntryOutcome::Invalid { .. }
                | EntryOutcome::Malformed { .. }
                | EntryOutcome::ProbeFailed { .. }
                | EntryOutcome::TransferFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub label: String,
    pub station: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Summary of one reconciliation run, in catalog order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub entries: Vec<EntryReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn push(&mut self, label: &str, station: &str, outcome: EntryOutcome) {
        self.entries.push(EntryReport {
            label: label.to_string(),
            station: station.to_string(),
            outcome,
        });
    }

    pub fn ingested(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ingested()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.entries.len() - self.ingested()
    }

    pub fn outcome_for(&self, label: &str) -> Option<&EntryOutcome> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.outcome)
    }
}
