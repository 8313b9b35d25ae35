//! In-memory store.
//!
//! Used for tests and scratch namespaces. All data is ephemeral.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{KvPair, KvStore};

/// Ordered in-memory key-value store.
///
/// Thread-safe via internal `RwLock`. Each operation holds the lock for its
/// whole duration, so `delete_tree` is atomic here. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<KvPair>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| KvPair::new(k.clone(), v.clone()))
            .collect())
    }

    fn delete_tree(&self, prefix: &str) -> StoreResult<()> {
        let mut entries = self.entries.write();
        let doomed: Vec<String> = entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            entries.remove(&key);
        }
        Ok(())
    }
}
