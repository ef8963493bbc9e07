use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatatraceError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Directory walk error: {0}")]
    WalkError(#[from] walkdir::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Ambiguous reference: '{prefix}' matches {matches} datasets")]
    AmbiguousReference { prefix: String, matches: usize },
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

/// Coarse error classes exposed to front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AmbiguousReference,
    InvalidArgument,
    IntegrityViolation,
    StorageFailure,
}

impl DatatraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatatraceError::NotFound(_) => ErrorKind::NotFound,
            DatatraceError::AmbiguousReference { .. } => ErrorKind::AmbiguousReference,
            DatatraceError::InvalidArgument(_) | DatatraceError::ConfigError(_) => {
                ErrorKind::InvalidArgument
            }
            DatatraceError::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            DatatraceError::RusqliteError(_)
            | DatatraceError::IoError(_)
            | DatatraceError::WalkError(_)
            | DatatraceError::SerdeError(_) => ErrorKind::StorageFailure,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AmbiguousReference => "ambiguous_reference",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::IntegrityViolation => "integrity_violation",
            ErrorKind::StorageFailure => "storage_failure",
        };
        f.write_str(s)
    }
}
