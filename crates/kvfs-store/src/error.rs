//! Store error types.

use std::io;
use thiserror::Error;

/// Errors reported by a [`KvStore`](crate::KvStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key does not exist.
    #[error("key not found: {0}")]
    NotFound(String),

    /// Bucket name cannot be used as a table.
    #[error("invalid bucket name: {0:?}")]
    InvalidBucket(String),

    /// SQLite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error (creating the data directory, etc).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create an InvalidBucket error.
    pub fn invalid_bucket(name: impl Into<String>) -> Self {
        Self::InvalidBucket(name.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true if the key was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(StoreError::not_found("a").is_not_found());
        assert!(!StoreError::other("boom").is_not_found());
        assert!(!StoreError::invalid_bucket("").is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(StoreError::not_found("src/a.txt").to_string(), "key not found: src/a.txt");
        assert_eq!(StoreError::invalid_bucket("").to_string(), "invalid bucket name: \"\"");
    }
}
