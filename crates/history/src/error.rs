//! Error types for history reads.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a history read as a whole.
///
/// Malformed lines are not errors at this level: they are logged and
/// skipped while scanning.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("unable to open history file {path:?}: {source}")]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to read history file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HistoryError {
    /// Returns true when the log simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        match self {
            HistoryError::FileUnavailable { source, .. } => source.kind() == io::ErrorKind::NotFound,
            HistoryError::Read { .. } => false,
        }
    }
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
