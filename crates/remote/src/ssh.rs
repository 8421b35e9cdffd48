//! Remote file channel backed by the `ssh` and `rsync` binaries.
//!
//! Probing runs `test -f <path> && stat -c %s <path>` over ssh. Pulling runs
//! `rsync -avz --partial --remove-source-files` with ssh as the remote shell,
//! so the source is only deleted after rsync has verified the copy.
//! Both authenticate with a private key in batch mode (no password prompts).

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use loghaul_core::config::SshConfig;
use loghaul_core::RemoteTarget;

use crate::channel::{RemoteError, RemoteFileChannel};

/// ssh exits with 255 when the connection or authentication fails.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Shells out to `ssh`/`rsync` with public-key authentication.
#[derive(Debug, Clone)]
pub struct SshChannel {
    key_path: PathBuf,
    ssh_bin: String,
    rsync_bin: String,
    connect_timeout: Duration,
    probe_timeout: Duration,
    transfer_timeout: Duration,
}

impl SshChannel {
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 1800;

    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            ssh_bin: "ssh".to_string(),
            rsync_bin: "rsync".to_string(),
            connect_timeout: Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(Self::DEFAULT_PROBE_TIMEOUT_SECS),
            transfer_timeout: Duration::from_secs(Self::DEFAULT_TRANSFER_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &SshConfig) -> Self {
        Self {
            key_path: config.key_path.clone(),
            ssh_bin: config.ssh_bin.clone(),
            rsync_bin: config.rsync_bin.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            transfer_timeout: Duration::from_secs(config.transfer_timeout_secs),
        }
    }

    pub fn with_binaries(mut self, ssh_bin: impl Into<String>, rsync_bin: impl Into<String>) -> Self {
        self.ssh_bin = ssh_bin.into();
        self.rsync_bin = rsync_bin.into();
        self
    }

    pub fn with_timeouts(mut self, probe: Duration, transfer: Duration) -> Self {
        self.probe_timeout = probe;
        self.transfer_timeout = transfer;
        self
    }

    /// `-i <key> -o BatchMode=yes ...` shared by probe and rsync's remote shell.
    fn ssh_options(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "PasswordAuthentication=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
        ]
    }

    pub(crate) fn probe_args(&self, target: &RemoteTarget) -> Vec<String> {
        let mut args = self.ssh_options();
        args.push("--".to_string());
        args.push(target.login());
        args.push(probe_command(&target.path));
        args
    }

    pub(crate) fn rsync_args(&self, target: &RemoteTarget, dest: &Path) -> Vec<String> {
        let remote_shell = std::iter::once(self.ssh_bin.clone())
            .chain(self.ssh_options())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            "-avz".to_string(),
            "--partial".to_string(),
            "--remove-source-files".to_string(),
            "-e".to_string(),
            remote_shell,
            "--".to_string(),
            target.rsync_source(),
            dest.display().to_string(),
        ]
    }

    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, RemoteError> {
        debug!(program, ?args, timeout_secs = timeout.as_secs(), "spawning remote command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RemoteError::Spawn {
                program: program.to_string(),
                source,
            })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RemoteError::Io(e)),
            Err(_) => {
                warn!(program, timeout_secs = timeout.as_secs(), "remote command timed out");
                Err(RemoteError::Timeout(program.to_string(), timeout))
            }
        }
    }
}

#[async_trait]
impl RemoteFileChannel for SshChannel {
    async fn probe(&self, target: &RemoteTarget) -> Result<Option<u64>, RemoteError> {
        let output = self
            .run(&self.ssh_bin, &self.probe_args(target), self.probe_timeout)
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match output.status.code() {
            Some(0) => {
                let raw = stdout.trim();
                raw.parse::<u64>()
                    .map(Some)
                    .map_err(|_| RemoteError::InvalidOutput(raw.to_string()))
            }
            Some(SSH_CONNECTION_FAILURE) => Err(RemoteError::Connection {
                host: target.host.clone(),
                message: stderr.trim().to_string(),
            }),
            code => {
                debug!(%target, ?code, stderr = %stderr.trim(), "remote file absent");
                Ok(None)
            }
        }
    }

    async fn transfer(&self, target: &RemoteTarget, dest: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = self
            .run(&self.rsync_bin, &self.rsync_args(target, dest), self.transfer_timeout)
            .await?;

        if !output.status.success() {
            return Err(RemoteError::Command {
                program: self.rsync_bin.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(%target, dest = %dest.display(), "pulled remote file and removed source");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "ssh"
    }
}

/// Remote shell command printing the size of `path` if it is a regular file.
fn probe_command(path: &str) -> String {
    let quoted = quote_remote_path(path);
    format!("test -f {quoted} && stat -c %s {quoted}")
}

/// Quote a remote path, leaving a leading `~/` outside the quotes so the
/// remote shell still expands it.
fn quote_remote_path(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => format!("~/{}", shell_quote(rest)),
        None => shell_quote(path),
    }
}

/// POSIX single-quote escaping.
fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,%+".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}
