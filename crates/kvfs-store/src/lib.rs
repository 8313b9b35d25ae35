//! # kvfs-store
//!
//! Flat, prefix-scannable key-value stores that kvfs builds its filesystem on.
//!
//! - [`KvStore`] - the store contract (single-key get/put/delete plus prefix list/delete)
//! - [`MemoryStore`] - ordered in-memory map, for tests and scratch namespaces
//! - [`SqliteStore`] - one SQLite table per bucket
//! - [`KvDb`] - opens `(database, bucket)` pairs and caches the handles
//!
//! Stores are constructed explicitly and handed to whoever needs them; there is
//! no global backend registry.

mod db;
mod error;
mod memory;
mod sqlite;
mod traits;

pub use db::KvDb;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KvPair, KvStore};
