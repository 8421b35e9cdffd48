//! Remote file access for log ingestion.
//!
//! This crate provides:
//! - `RemoteFileChannel` trait with a read-only `probe` and a pulling `transfer`
//! - `SshChannel`, which shells out to `ssh` and `rsync`

pub mod channel;
pub mod ssh;

pub use channel::{RemoteError, RemoteFileChannel};
pub use ssh::SshChannel;
