//! Store opener.
//!
//! Maps `(database, bucket)` pairs onto concrete stores. A database is one
//! SQLite file under the data directory and a bucket is one table inside it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::traits::KvStore;

#[derive(Debug, Clone)]
enum Backend {
    Memory,
    Sqlite { data_dir: PathBuf },
}

/// Opens and caches stores by `(database, bucket)`.
///
/// Repeated opens of the same pair return the same handle.
pub struct KvDb {
    backend: Backend,
    stores: DashMap<(String, String), Arc<dyn KvStore>>,
}

impl std::fmt::Debug for KvDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvDb")
            .field("backend", &self.backend)
            .field("open_stores", &self.stores.len())
            .finish()
    }
}

impl KvDb {
    /// Databases are `<data_dir>/<database>.sqlite`.
    pub fn sqlite(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Sqlite {
                data_dir: data_dir.into(),
            },
            stores: DashMap::new(),
        }
    }

    /// Every bucket is an independent [`MemoryStore`].
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            stores: DashMap::new(),
        }
    }

    /// Data directory, if this opener is file-backed.
    pub fn data_dir(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Memory => None,
            Backend::Sqlite { data_dir } => Some(data_dir),
        }
    }

    /// Open `bucket` inside `database`, reusing a cached handle when there is one.
    pub fn open(&self, database: &str, bucket: &str) -> StoreResult<Arc<dyn KvStore>> {
        let cache_key = (database.to_string(), bucket.to_string());
        if let Some(store) = self.stores.get(&cache_key) {
            return Ok(Arc::clone(store.value()));
        }

        let store: Arc<dyn KvStore> = match &self.backend {
            Backend::Memory => Arc::new(MemoryStore::new()),
            Backend::Sqlite { data_dir } => {
                std::fs::create_dir_all(data_dir)?;
                let path = data_dir.join(format!("{database}.sqlite"));
                Arc::new(SqliteStore::open(path, bucket)?)
            }
        };

        // Another thread may have raced us here; keep whichever landed first.
        let entry = self.stores.entry(cache_key).or_insert(store);
        Ok(Arc::clone(entry.value()))
    }

    /// Drop the cached handle for a pair. Data is untouched.
    pub fn close(&self, database: &str, bucket: &str) -> bool {
        self.stores
            .remove(&(database.to_string(), bucket.to_string()))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_buckets_are_independent() {
        let db = KvDb::memory();
        let a = db.open("project", "1.source").unwrap();
        let b = db.open("project", "1.theme").unwrap();

        a.put("k", b"a").unwrap();
        assert!(b.get("k").unwrap_err().is_not_found());
    }

    #[test]
    fn test_open_is_cached() {
        let db = KvDb::memory();
        let first = db.open("project", "1.source").unwrap();
        let second = db.open("project", "1.source").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(db.close("project", "1.source"));
        let third = db.open("project", "1.source").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_sqlite_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("data");
        let db = KvDb::sqlite(&data_dir);

        let store = db.open("project", "1.source").unwrap();
        store.put("a", b"1").unwrap();

        assert!(data_dir.join("project.sqlite").exists());
        assert_eq!(db.data_dir(), Some(data_dir.as_path()));
    }

    #[test]
    fn test_sqlite_invalid_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let db = KvDb::sqlite(dir.path());
        assert!(db.open("project", "").is_err());
    }
}
