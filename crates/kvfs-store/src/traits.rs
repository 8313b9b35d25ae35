//! Key-value store contract.

use crate::error::StoreResult;

/// A key and its stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Full key.
    pub key: String,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl KvPair {
    /// Create a new pair.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Flat key-value store with prefix queries.
///
/// Each call is atomic for the single key it touches. Nothing here spans
/// several keys atomically except what an implementation documents for
/// `delete_tree`.
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// Returns `StoreError::NotFound` if the key is absent.
    fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`.
    ///
    /// Returns `StoreError::NotFound` if the key is absent.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Every pair whose key starts with `prefix`. An empty prefix lists the whole store.
    fn list(&self, prefix: &str) -> StoreResult<Vec<KvPair>>;

    /// Remove every key starting with `prefix`. Succeeds when nothing matches.
    fn delete_tree(&self, prefix: &str) -> StoreResult<()>;

    /// Check whether `key` is present.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
