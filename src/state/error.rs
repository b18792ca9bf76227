//! Error types for the persistence module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the session stores.
#[derive(Error, Debug)]
pub enum StateError {
    /// Failed to open or create the payload database file.
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to run a database migration.
    #[error("Database migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    /// A query failed.
    #[error("Database query failed: {0}")]
    Query(String),

    /// Reading or writing the metadata document failed.
    #[error("Metadata file error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The metadata document could not be encoded.
    #[error("Failed to encode session descriptor: {0}")]
    Encode(#[from] serde_json::Error),

    /// Failed to spawn a blocking task.
    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    /// The database schema version is newer than supported.
    #[error("Database schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl StateError {
    /// Create a Query error from a rusqlite error.
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }

    /// Whether retrying the same write might succeed (busy database, transient
    /// I/O). Encoding and schema problems will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StateError::Query(_) | StateError::Io { .. } | StateError::Spawn(_) => true,
            StateError::Open { .. }
            | StateError::Migration(_)
            | StateError::Encode(_)
            | StateError::UnsupportedSchemaVersion { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(StateError::Query("database is locked".into()).is_retryable());
        assert!(StateError::Io {
            path: PathBuf::from("/tmp/session.json"),
            source: std::io::Error::other("disk busy"),
        }
        .is_retryable());
        assert!(!StateError::UnsupportedSchemaVersion {
            found: 9,
            expected: 1
        }
        .is_retryable());
    }
}
