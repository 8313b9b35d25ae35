//! VFS error types.

use std::io;

use kvfs_store::StoreError;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Empty or malformed path (e.g. an empty file name).
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// The store failed (connectivity, corruption, ...).
    #[error("I/O error: {0}")]
    Io(#[source] StoreError),

    /// A write would grow the file past the configured size limit.
    #[error("{path}: write would exceed the {limit} byte file size limit")]
    TooLarge {
        path: String,
        limit: u64,
    },

    /// A multi-key operation stopped after some of its steps were applied.
    ///
    /// The namespace may now be inconsistent (for example both rename keys present).
    #[error("{op} partially applied to {path}: {detail}")]
    PartialFailure {
        /// Operation name (`rename`, `rmdir`).
        op: &'static str,
        /// Path the operation was called on.
        path: String,
        /// What was and was not applied.
        detail: String,
    },
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a TooLarge error.
    pub fn too_large(path: impl Into<String>, limit: u64) -> Self {
        Self::TooLarge {
            path: path.into(),
            limit,
        }
    }

    /// Create a PartialFailure error.
    pub fn partial(op: &'static str, path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::PartialFailure {
            op,
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Returns true for NotFound.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for InvalidPath.
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath(_))
    }

    /// Returns true for store failures.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true for TooLarge.
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLarge { .. })
    }

    /// Returns true for PartialFailure.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialFailure { .. })
    }
}

impl From<StoreError> for VfsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => VfsError::NotFound(key),
            other => VfsError::Io(other),
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Io(e) => io::Error::other(e),
            e @ VfsError::TooLarge { .. } => {
                io::Error::new(io::ErrorKind::FileTooLarge, e.to_string())
            }
            e @ VfsError::PartialFailure { .. } => io::Error::other(e.to_string()),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
