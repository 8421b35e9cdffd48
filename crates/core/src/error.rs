use thiserror::Error;

/// Rejections raised while building a new catalog entry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EntryError {
    #[error("unknown station: {0}")]
    UnknownStation(String),

    #[error("label must not be empty")]
    EmptyLabel,

    #[error("user must not be empty")]
    EmptyUser,

    #[error("invalid user name: {0}")]
    InvalidUser(String),

    #[error("invalid host address: {0}")]
    InvalidHost(String),

    #[error("log file path must not be empty")]
    EmptyPath,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("expected size must be a positive number of megabytes")]
    NonPositiveSize,
}
