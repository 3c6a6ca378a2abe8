//! Error types for resultsview-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Run directory name is not a numeric build id
    InvalidRunId,
    /// Package identity is missing one of name/version/release
    InvalidPackage,
    /// Job is not stored in the index
    JobNotFound,
    /// Run is not stored in the index
    RunNotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRunId => "invalid_run_id",
            ErrorKind::InvalidPackage => "invalid_package",
            ErrorKind::JobNotFound => "job_not_found",
            ErrorKind::RunNotFound => "run_not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    // Convenience constructors
    pub fn invalid_run_id(run_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidRunId,
            format!("Run id is not numeric: {}", run_id.into()),
        )
    }

    pub fn invalid_package(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPackage, message)
    }

    pub fn job_not_found(name: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::JobNotFound,
            format!("Job not found: {}", name.into()),
        )
    }

    pub fn run_not_found(job: impl fmt::Display, run_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::RunNotFound,
            format!("Run not found: {}/{}", job, run_id),
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
