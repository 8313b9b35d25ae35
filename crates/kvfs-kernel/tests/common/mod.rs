//! Shared test helpers.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use kvfs_store::{KvPair, KvStore, MemoryStore, StoreError, StoreResult};
use parking_lot::Mutex;

/// Install a fmt subscriber that writes through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct Faults {
    put: HashSet<String>,
    delete: HashSet<String>,
    delete_tree: bool,
    down: bool,
}

/// Store wrapper that fails chosen calls on demand.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<Faults>,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `put` of this exact key fail.
    pub fn fail_put(&self, key: &str) {
        self.faults.lock().put.insert(key.to_string());
    }

    /// Make `delete` of this exact key fail.
    pub fn fail_delete(&self, key: &str) {
        self.faults.lock().delete.insert(key.to_string());
    }

    /// Make every `delete_tree` fail.
    pub fn fail_delete_tree(&self) {
        self.faults.lock().delete_tree = true;
    }

    /// Fail every call, as if the store were unreachable.
    pub fn go_down(&self) {
        self.faults.lock().down = true;
    }

    /// Clear all faults.
    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Keys currently stored, bypassing faults.
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// Raw value, bypassing faults.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).ok()
    }

    fn check_down(&self) -> StoreResult<()> {
        if self.faults.lock().down {
            return Err(StoreError::other("store unreachable"));
        }
        Ok(())
    }
}

impl KvStore for FaultyStore {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.check_down()?;
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check_down()?;
        if self.faults.lock().put.contains(key) {
            return Err(StoreError::other(format!("injected put failure on {key}")));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_down()?;
        if self.faults.lock().delete.contains(key) {
            return Err(StoreError::other(format!("injected delete failure on {key}")));
        }
        self.inner.delete(key)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<KvPair>> {
        self.check_down()?;
        self.inner.list(prefix)
    }

    fn delete_tree(&self, prefix: &str) -> StoreResult<()> {
        self.check_down()?;
        if self.faults.lock().delete_tree {
            return Err(StoreError::other(format!("injected delete_tree failure on {prefix}")));
        }
        self.inner.delete_tree(prefix)
    }
}
