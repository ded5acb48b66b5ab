use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ingest::IngestError;

/// Errors surfaced by the threading engine.
///
/// Data-quality problems in the input (empty references, unseen keys, duplicate keys) are
/// tolerated and logged rather than reported here. `InvariantViolation` is reserved for
/// programming errors detected by a bounded walk.
#[derive(Debug, Error)]
pub enum ThreadingError {
    #[error("row not found for {key}")]
    RowNotFound { key: String },

    #[error("forest invariant violated: {detail}")]
    InvariantViolation { detail: String },

    #[error("thread build for folder '{folder}' was cancelled")]
    Cancelled { folder: String },

    #[error("expansion state I/O error on {}: {source}", path.display())]
    ExpansionState {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("background build task failed: {0}")]
    BuildTaskFailed(String),
}

impl ThreadingError {
    pub fn row_not_found(key: impl Into<String>) -> Self {
        ThreadingError::RowNotFound { key: key.into() }
    }

    pub fn invariant(detail: impl Into<String>) -> Self {
        ThreadingError::InvariantViolation {
            detail: detail.into(),
        }
    }

    pub fn cancelled(folder: impl Into<String>) -> Self {
        ThreadingError::Cancelled {
            folder: folder.into(),
        }
    }

    /// True for the recoverable "row not found" condition.
    pub fn is_row_not_found(&self) -> bool {
        matches!(self, ThreadingError::RowNotFound { .. })
    }
}

pub type ThreadingResult<T> = Result<T, ThreadingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_recoverable() {
        let err = ThreadingError::row_not_found("uid-7");
        assert!(err.is_row_not_found());
        assert_eq!(err.to_string(), "row not found for uid-7");
    }

    #[test]
    fn test_invariant_violation_is_distinct() {
        let err = ThreadingError::invariant("container 3 visited twice");
        assert!(!err.is_row_not_found());
        assert!(err.to_string().contains("visited twice"));
    }
}
