//! Error types for the file index

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::glob::GlobError;

/// Index error type
#[derive(Error, Debug)]
pub enum IndexError {
    /// A single file could not be stat'ed or read. Indexing skips the file
    /// and keeps going.
    #[error("Cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Import from {} failed: {reason}", path.display())]
    ImportFailure { path: PathBuf, reason: String },

    #[error("Pattern error: {0}")]
    Pattern(#[from] GlobError),

    #[error("Fingerprint error: {0}")]
    Fingerprint(String),

    #[error("Database error: {0}")]
    Database(#[from] hashdex_db::DbError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IndexError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether indexing can skip the offending file and continue.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::FileAccess { .. } | Self::Fingerprint(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_access_display() {
        let err = IndexError::file_access(
            "/data/a.jpg",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Cannot access /data/a.jpg: denied");
        assert!(err.is_per_file());
    }

    #[test]
    fn test_database_errors_are_fatal() {
        let err = IndexError::from(hashdex_db::DbError::not_found("/tmp/gone.db"));
        assert!(!err.is_per_file());
        assert!(!IndexError::invalid_argument("bad").is_per_file());
    }
}
