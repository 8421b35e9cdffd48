use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_path(profile: &str, key: &str, default: &str) -> PathBuf {
    expand_home(&profiled_env_or(profile, key, default))
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    pub ssh: SshConfig,
    pub notify: NotifyConfig,
    pub reconcile: ReconcileConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LOGHAUL_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LOGHAUL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            catalog: CatalogConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            ssh: SshConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
            reconcile: ReconcileConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  catalog:    path={}", self.catalog.path.display());
        tracing::info!("  storage:    base_dir={}", self.storage.base_dir.display());
        tracing::info!(
            "  ssh:        key={}, connect_timeout={}s, probe_timeout={}s, transfer_timeout={}s",
            self.ssh.key_path.display(),
            self.ssh.connect_timeout_secs,
            self.ssh.probe_timeout_secs,
            self.ssh.transfer_timeout_secs
        );
        tracing::info!("  notify:     channel={}", self.notify.channel);
        tracing::info!("  reconcile:  size_match={}", self.reconcile.size_match);
    }
}

// ── Catalog ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

impl CatalogConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: profiled_env_path(p, "CATALOG_PATH", "labels.json"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root under which pulled logs land, one directory per station.
    pub base_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_dir: profiled_env_path(p, "LOG_BASE_DIR", "~/logs"),
        }
    }
}

// ── SSH / rsync ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub key_path: PathBuf,
    pub ssh_bin: String,
    pub rsync_bin: String,
    pub connect_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
}

impl SshConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            key_path: profiled_env_path(p, "SSH_KEY_PATH", "~/.ssh/id_rsa"),
            ssh_bin: profiled_env_or(p, "SSH_BIN", "ssh"),
            rsync_bin: profiled_env_or(p, "RSYNC_BIN", "rsync"),
            connect_timeout_secs: profiled_env_u64(p, "SSH_CONNECT_TIMEOUT_SECS", 10),
            probe_timeout_secs: profiled_env_u64(p, "PROBE_TIMEOUT_SECS", 30),
            transfer_timeout_secs: profiled_env_u64(p, "TRANSFER_TIMEOUT_SECS", 1800),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// "smtp", "relay" or "none"
    pub channel: String,
    pub sender: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_tls: bool,
    /// ZeroMQ endpoint of the mail relay (e.g. `tcp://mail-relay:5557`).
    pub relay_endpoint: Option<String>,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            channel: profiled_env_or(p, "NOTIFY_CHANNEL", "none").to_lowercase(),
            sender: profiled_env_or(p, "NOTIFY_SENDER", "loghaul@localhost"),
            smtp_host: profiled_env_opt(p, "SMTP_HOST"),
            smtp_port: profiled_env_u16(p, "SMTP_PORT", 587),
            smtp_tls: profiled_env_or(p, "SMTP_TLS", "true") == "true",
            relay_endpoint: profiled_env_opt(p, "NOTIFY_RELAY_ENDPOINT"),
            subject_template: profiled_env_opt(p, "NOTIFY_SUBJECT_TEMPLATE"),
            body_template: profiled_env_opt(p, "NOTIFY_BODY_TEMPLATE"),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.channel != "none"
    }
}

// ── Reconciliation ────────────────────────────────────────────

/// How a probed remote size is compared against the expected size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeMatch {
    /// Remote size must equal the expected size exactly.
    #[default]
    Exact,
    /// Remote size must be at least the expected size.
    AtLeast,
}

impl SizeMatch {
    pub fn matches(&self, remote_mb: u64, expected_mb: u64) -> bool {
        match self {
            SizeMatch::Exact => remote_mb == expected_mb,
            SizeMatch::AtLeast => remote_mb >= expected_mb,
        }
    }
}

impl std::fmt::Display for SizeMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeMatch::Exact => f.write_str("exact"),
            SizeMatch::AtLeast => f.write_str("at-least"),
        }
    }
}

impl FromStr for SizeMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "eq" => Ok(SizeMatch::Exact),
            "at-least" | "at_least" | "gte" => Ok(SizeMatch::AtLeast),
            other => Err(format!("unknown size match policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub size_match: SizeMatch,
}

impl ReconcileConfig {
    fn from_env_profiled(p: &str) -> Self {
        let raw = profiled_env_or(p, "SIZE_MATCH", "exact");
        let size_match = raw.parse().unwrap_or_else(|e| {
            tracing::warn!(value = %raw, error = %e, "invalid SIZE_MATCH, using exact");
            SizeMatch::Exact
        });
        Self { size_match }
    }
}
