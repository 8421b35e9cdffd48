//! Remote file channel trait and shared error type.

use std::path::Path;
use std::time::Duration;

use loghaul_core::RemoteTarget;

/// Errors raised while talking to a remote host.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error("{program} exited with code {code}: {stderr}")]
    Command {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("unexpected probe output: {0:?}")]
    InvalidOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only inspection and pull of single files on remote hosts.
#[async_trait::async_trait]
pub trait RemoteFileChannel: Send + Sync {
    /// Size in bytes of the remote file, or `None` if it does not exist.
    ///
    /// Must not modify anything on the remote host.
    async fn probe(&self, target: &RemoteTarget) -> Result<Option<u64>, RemoteError>;

    /// Copy the remote file to `dest` and remove the remote source once the
    /// copy has been verified by the transport. Creates `dest`'s parent
    /// directories.
    async fn transfer(&self, target: &RemoteTarget, dest: &Path) -> Result<(), RemoteError>;

    /// Human-readable name for this channel (e.g., "ssh").
    fn channel_name(&self) -> &str;
}
