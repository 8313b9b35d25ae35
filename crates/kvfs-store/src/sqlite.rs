//! SQLite-backed store.
//!
//! One table per bucket, so several independent namespaces can share a
//! database file.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KvPair, KvStore};

/// Longest bucket name accepted.
const MAX_BUCKET_LEN: usize = 64;

/// How long a writer waits on a lock held by another connection to the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Key-value store in a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    bucket: String,
    table: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) `bucket` in the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, bucket: &str) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!("opened sqlite store {} bucket {}", path.as_ref().display(), bucket);
        Self::with_connection(conn, bucket)
    }

    /// Create an in-memory database holding one bucket (for testing).
    pub fn in_memory(bucket: &str) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, bucket)
    }

    fn with_connection(conn: Connection, bucket: &str) -> StoreResult<Self> {
        let table = table_name(bucket)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );"
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            bucket: bucket.to_string(),
            table,
        })
    }

    /// Bucket this store reads and writes.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Quote a bucket name as a table identifier.
fn table_name(bucket: &str) -> StoreResult<String> {
    if bucket.is_empty() || bucket.len() > MAX_BUCKET_LEN || bucket.contains('\0') {
        return Err(StoreError::invalid_bucket(bucket));
    }
    Ok(format!("\"kv_{}\"", bucket.replace('"', "\"\"")))
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let conn = self.conn.lock();
        let value: Option<Vec<u8>> = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        value.ok_or_else(|| StoreError::not_found(key))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                self.table
            ),
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", self.table),
            params![key],
        )?;
        if removed == 0 {
            return Err(StoreError::not_found(key));
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<KvPair>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT key, value FROM {}
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key",
            self.table
        ))?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok(KvPair {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn delete_tree(&self, prefix: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE substr(key, 1, length(?1)) = ?1",
                self.table
            ),
            params![prefix],
        )?;
        tracing::debug!("delete_tree {:?} removed {} keys", prefix, removed);
        Ok(())
    }
}
