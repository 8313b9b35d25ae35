//! Per-project filesystem namespaces.
//!
//! Every project owns independent buckets (site sources, theme), each one a
//! separate store table with its own engine. `ProjectSpaces` hands out exactly
//! one engine per project+bucket pair so callers can share it.

use std::sync::Arc;

use dashmap::DashMap;
use kvfs_store::KvDb;
use strum::{Display, EnumString};

use crate::config::KvfsConfig;
use crate::vfs::{KvFs, KvFsOptions, VfsResult};

/// Database every project bucket lives in.
pub const PROJECT_DATABASE: &str = "project";

/// A project's independent namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Bucket {
    /// Site content.
    Source,
    /// Theme files.
    Theme,
}

impl Bucket {
    /// Store table name for a project's bucket: `<project_id>.<bucket>`.
    pub fn table(&self, project_id: i64) -> String {
        format!("{project_id}.{self}")
    }
}

/// Engine registry keyed by project and bucket.
#[derive(Debug)]
pub struct ProjectSpaces {
    db: KvDb,
    options: KvFsOptions,
    spaces: DashMap<(i64, Bucket), Arc<KvFs>>,
}

impl ProjectSpaces {
    pub fn new(db: KvDb, options: KvFsOptions) -> Self {
        Self {
            db,
            options,
            spaces: DashMap::new(),
        }
    }

    /// Store and engine options from configuration.
    pub fn from_config(config: &KvfsConfig) -> Self {
        Self::new(config.open_db(), config.fs_options())
    }

    /// The engine for one project bucket, opened on first use.
    #[tracing::instrument(skip(self), name = "kvfs.namespace")]
    pub fn fs(&self, project_id: i64, bucket: Bucket) -> VfsResult<Arc<KvFs>> {
        if let Some(fs) = self.spaces.get(&(project_id, bucket)) {
            return Ok(Arc::clone(fs.value()));
        }

        let store = self.db.open(PROJECT_DATABASE, &bucket.table(project_id))?;
        let fs = Arc::new(KvFs::with_options(store, self.options.clone()));
        tracing::debug!("opened namespace {}", bucket.table(project_id));

        let entry = self.spaces.entry((project_id, bucket)).or_insert(fs);
        Ok(Arc::clone(entry.value()))
    }

    /// Drop every cached engine of a project. Stored data is untouched.
    pub fn evict(&self, project_id: i64) -> usize {
        let mut evicted = 0;
        for bucket in [Bucket::Source, Bucket::Theme] {
            if self.spaces.remove(&(project_id, bucket)).is_some() {
                self.db.close(PROJECT_DATABASE, &bucket.table(project_id));
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of open engines.
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}
