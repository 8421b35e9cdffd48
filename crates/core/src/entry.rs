use std::net::IpAddr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EntryError;
use crate::station::Station;

/// One tracked log source in the catalog.
///
/// Every field defaults when missing or `null` so a single incomplete record
/// does not make the whole catalog unreadable; the reconciliation job
/// classifies such records as invalid and leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub station: String,
    /// Primary key within the catalog.
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    /// Remote host (IPv4, IPv6 or hostname).
    #[serde(default, deserialize_with = "null_as_default", rename = "ip_address")]
    pub host: String,
    /// Absolute path of the log file on the remote host.
    #[serde(default, deserialize_with = "null_as_default", rename = "log_file_path")]
    pub remote_path: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "email_to")]
    pub recipients: Vec<String>,
    /// Size the remote file must reach before it is pulled, in whole MB.
    #[serde(default, deserialize_with = "null_as_default", rename = "log_size_mb")]
    pub expected_size_mb: u64,
    /// ISO-8601 time of the last successful ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// `null` deserializes to the field's default, like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl IngestionEntry {
    /// Names of required fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("station", &self.station),
            ("label", &self.label),
            ("user", &self.user),
            ("ip_address", &self.host),
            ("log_file_path", &self.remote_path),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn target(&self) -> RemoteTarget {
        RemoteTarget {
            user: self.user.clone(),
            host: self.host.clone(),
            path: self.remote_path.clone(),
        }
    }
}

/// A file on a remote host, addressed as `user@host:path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub path: String,
}

impl RemoteTarget {
    /// `user@host` as accepted by ssh.
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `user@host:path` as accepted by rsync; IPv6 hosts are bracketed.
    pub fn rsync_source(&self) -> String {
        if self.host.contains(':') {
            format!("{}@[{}]:{}", self.user, self.host, self.path)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.path)
        }
    }
}

impl std::fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.path)
    }
}

/// Unvalidated entry as submitted by an entry producer.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub station: String,
    pub label: String,
    pub user: String,
    pub host: String,
    pub remote_path: String,
    pub recipients: Vec<String>,
    pub expected_size_mb: i64,
}

impl NewEntry {
    /// Validate every field and produce a catalog record.
    ///
    /// `timestamp` is left empty; it is only set by a successful ingestion.
    pub fn validate(self) -> Result<IngestionEntry, EntryError> {
        let station: Station = self.station.parse()?;

        let label = self.label.trim().to_string();
        if label.is_empty() {
            return Err(EntryError::EmptyLabel);
        }

        let user = self.user.trim().to_string();
        if user.is_empty() {
            return Err(EntryError::EmptyUser);
        }
        if !is_valid_user(&user) {
            return Err(EntryError::InvalidUser(user));
        }

        let host = self.host.trim().to_string();
        if !is_valid_host(&host) {
            return Err(EntryError::InvalidHost(self.host));
        }

        let remote_path = self.remote_path.trim().to_string();
        if remote_path.is_empty() {
            return Err(EntryError::EmptyPath);
        }

        let mut recipients = Vec::with_capacity(self.recipients.len());
        for raw in &self.recipients {
            let addr = raw.trim();
            if addr.is_empty() {
                continue;
            }
            addr.parse::<lettre::Address>()
                .map_err(|_| EntryError::InvalidEmail(addr.to_string()))?;
            recipients.push(addr.to_string());
        }

        if self.expected_size_mb <= 0 {
            return Err(EntryError::NonPositiveSize);
        }

        Ok(IngestionEntry {
            station: station.as_str().to_string(),
            label,
            user,
            host,
            remote_path,
            recipients,
            expected_size_mb: self.expected_size_mb as u64,
            timestamp: None,
        })
    }
}

/// Split a comma separated address list, dropping blanks.
pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `user@host` into its parts. A bare host yields `None` for the user.
pub fn split_login(login: &str) -> (Option<&str>, &str) {
    match login.split_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, login),
    }
}

/// Portable POSIX login name: `[A-Za-z0-9._-]`, not starting with `-`.
pub fn is_valid_user(user: &str) -> bool {
    !user.is_empty()
        && user.len() <= 32
        && !user.starts_with('-')
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Accepts an IPv4/IPv6 literal or an RFC 1123 hostname.
pub fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    // All-numeric dotted strings that failed IP parsing are malformed addresses.
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return false;
    }
    let host = host.strip_suffix('.').unwrap_or(host);
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
