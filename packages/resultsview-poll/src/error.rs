use std::fmt;
use std::path::{Path, PathBuf};

use resultsview_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, PollError>;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed status file: {0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl PollError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn malformed<E: fmt::Display>(e: E) -> Self {
        Self::Malformed(e.to_string())
    }

    pub fn scheduler<E: fmt::Display>(e: E) -> Self {
        Self::Scheduler(e.to_string())
    }

    /// Whether retrying the same poll later can succeed.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PollError::Io { .. } | PollError::Scheduler(_) => ErrorCategory::Transient,
            // a status file may still be half written
            PollError::Xml(_) | PollError::Malformed(_) => ErrorCategory::Transient,
            PollError::Storage(_) | PollError::Config(_) => ErrorCategory::Permanent,
        }
    }
}

/// Error category for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Retry on the next tick (e.g. directory vanished mid-listing)
    Transient,
    /// Retrying cannot help (e.g. bad configuration)
    Permanent,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
