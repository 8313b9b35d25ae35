//! The filesystem engine.
//!
//! `KvFs` turns a flat [`KvStore`] into files and directories. It holds no
//! mutable state of its own: every call goes straight to the store, so any
//! number of threads can share one instance. Only single-key operations are
//! atomic; `rename` and `rmdir` touch several keys and can be observed half
//! done.

use std::cmp::Ordering;
use std::sync::Arc;

use kvfs_store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};

use super::attr::{
    AttributeCodec, Attributes, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_MAX_FILE_SIZE,
    HeaderV1, S_IFDIR, S_IFMT, S_IFREG, unix_now,
};
use super::error::{VfsError, VfsResult};
use super::path::{self, EntryKind, KeyCodec, SEPARATOR};
use super::types::{DirEntry, FileAttr, FileHandle, StatFs};

/// How `open_dir` orders its entries.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ListingOrder {
    /// Directories before files, each group by name.
    #[default]
    DirsFirst,
    /// By name only.
    Lexicographic,
}

impl ListingOrder {
    fn compare(&self, a: &DirEntry, b: &DirEntry) -> Ordering {
        match self {
            ListingOrder::DirsFirst => b
                .kind
                .is_dir()
                .cmp(&a.kind.is_dir())
                .then_with(|| a.name.cmp(&b.name)),
            ListingOrder::Lexicographic => a.name.cmp(&b.name),
        }
    }
}

/// Engine construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvFsOptions {
    /// Namespace root prefix inside the store (`""` for the whole store).
    pub root: String,
    /// Directory listing order.
    pub listing: ListingOrder,
    /// Permission bits for new files.
    pub file_mode: u32,
    /// Permission bits reported for directories.
    pub dir_mode: u32,
    /// Largest content a write may produce, in bytes.
    pub max_file_size: u64,
}

impl Default for KvFsOptions {
    fn default() -> Self {
        Self {
            root: String::new(),
            listing: ListingOrder::default(),
            file_mode: DEFAULT_FILE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Filesystem over a key-value store.
pub struct KvFs {
    store: Arc<dyn KvStore>,
    keys: KeyCodec,
    header: Box<dyn AttributeCodec>,
    options: KvFsOptions,
}

impl std::fmt::Debug for KvFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvFs")
            .field("root", &self.keys.root())
            .field("header_version", &self.header.version())
            .field("listing", &self.options.listing)
            .finish()
    }
}

impl KvFs {
    /// Engine over the whole store with default options.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_options(store, KvFsOptions::default())
    }

    /// Engine with explicit options.
    pub fn with_options(store: Arc<dyn KvStore>, options: KvFsOptions) -> Self {
        Self {
            store,
            keys: KeyCodec::new(&options.root),
            header: Box::new(HeaderV1),
            options,
        }
    }

    /// Options this engine was built with.
    pub fn options(&self) -> &KvFsOptions {
        &self.options
    }

    /// Path codec for this namespace.
    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    /// Create (or truncate) a file.
    pub fn create(&self, path: &str) -> VfsResult<FileHandle> {
        self.create_with_mode(path, self.options.file_mode)
    }

    /// Create (or truncate) a file with explicit permission bits (`0` for the default).
    #[tracing::instrument(skip(self), name = "kvfs.create")]
    pub fn create_with_mode(&self, path: &str, perm: u32) -> VfsResult<FileHandle> {
        let (normalized, key) = self.file_key(path)?;
        let perm = if perm & !S_IFMT == 0 {
            self.options.file_mode
        } else {
            perm
        };
        let attrs = Attributes::new_file(perm);
        self.store
            .put(&key, &self.header.join_value(&attrs, &[]))
            .map_err(|e| self.fail("create", &normalized, e))?;
        tracing::debug!("created {}", key);
        Ok(FileHandle::new(normalized, key))
    }

    /// Open an existing file.
    #[tracing::instrument(skip(self), name = "kvfs.open")]
    pub fn open(&self, path: &str) -> VfsResult<FileHandle> {
        let (normalized, key) = self.file_key(path)?;
        let exists = self
            .store
            .exists(&key)
            .map_err(|e| self.fail("open", &normalized, e))?;
        if !exists {
            return Err(VfsError::not_found(normalized));
        }
        Ok(FileHandle::new(normalized, key))
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns fewer bytes than asked (possibly none) at end of content.
    #[tracing::instrument(skip(self, handle), fields(path = %handle.path), name = "kvfs.read")]
    pub fn read(&self, handle: &FileHandle, offset: u64, len: usize) -> VfsResult<Vec<u8>> {
        let value = self
            .store
            .get(&handle.key)
            .map_err(|e| self.fail("read", &handle.path, e))?;
        let (_, content) = self.header.split_value(&value);

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
        let end = start.saturating_add(len).min(content.len());
        Ok(content[start..end].to_vec())
    }

    /// Replace everything from `offset` on with `data`.
    ///
    /// The stored content becomes `content[..offset] ++ data`; bytes past the
    /// end of the write are dropped. An offset past the end zero-fills the gap.
    /// Fails with `TooLarge` before touching the store if `offset + data.len()`
    /// exceeds [`KvFsOptions::max_file_size`].
    #[tracing::instrument(skip(self, handle, data), fields(path = %handle.path, len = data.len()), name = "kvfs.write")]
    pub fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> VfsResult<usize> {
        let limit = self.options.max_file_size;
        let end = u64::try_from(data.len())
            .ok()
            .and_then(|len| offset.checked_add(len))
            .filter(|end| *end <= limit);
        let Some(end) = end.and_then(|end| usize::try_from(end).ok()) else {
            tracing::warn!("write to {} at offset {} exceeds {} bytes", handle.path, offset, limit);
            return Err(VfsError::too_large(&handle.path, limit));
        };
        // end fits in usize, so offset does too
        let offset = end - data.len();

        let value = self
            .store
            .get(&handle.key)
            .map_err(|e| self.fail("write", &handle.path, e))?;
        let (mut attrs, content) = self.header.split_value(&value);

        let mut next = Vec::with_capacity(end);
        if offset <= content.len() {
            next.extend_from_slice(&content[..offset]);
        } else {
            next.extend_from_slice(content);
            next.resize(offset, 0);
        }
        next.extend_from_slice(data);

        let now = unix_now();
        if attrs.created_at == 0 {
            attrs.created_at = now;
        }
        attrs.modified_at = now;
        attrs.size = next.len() as u64;
        if attrs.mode == 0 {
            attrs.mode = S_IFREG | self.options.file_mode;
        }

        self.store
            .put(&handle.key, &self.header.join_value(&attrs, &next))
            .map_err(|e| self.fail("write", &handle.path, e))?;
        Ok(data.len())
    }

    /// Shrink a file to `new_size` bytes. Never grows it.
    #[tracing::instrument(skip(self), name = "kvfs.truncate")]
    pub fn truncate(&self, path: &str, new_size: u64) -> VfsResult<()> {
        let (normalized, key) = self.file_key(path)?;
        let value = self
            .store
            .get(&key)
            .map_err(|e| self.fail("truncate", &normalized, e))?;
        let (mut attrs, content) = self.header.split_value(&value);

        let keep = usize::try_from(new_size)
            .unwrap_or(usize::MAX)
            .min(content.len());
        attrs.size = keep as u64;
        attrs.modified_at = unix_now();

        self.store
            .put(&key, &self.header.join_value(&attrs, &content[..keep]))
            .map_err(|e| self.fail("truncate", &normalized, e))
    }

    /// Attributes of a file or, failing that, a directory of the same name.
    #[tracing::instrument(skip(self), name = "kvfs.get_attr")]
    pub fn get_attr(&self, path: &str) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        if normalized.is_empty() {
            return Ok(self.dir_attr());
        }

        let key = self.keys.to_key(&normalized, EntryKind::File)?;
        match self.store.get(&key) {
            Ok(value) => {
                let (mut attrs, content) = self.header.split_value(&value);
                attrs.size = content.len() as u64;
                if attrs.mode & S_IFMT == 0 {
                    attrs.mode |= S_IFREG;
                }
                if attrs.perm() == 0 {
                    attrs.mode |= self.options.file_mode;
                }
                Ok(FileAttr {
                    kind: EntryKind::File,
                    attrs,
                })
            }
            Err(e) if e.is_not_found() => {
                let marker = self.keys.dir_prefix(&normalized);
                let is_dir = self
                    .store
                    .exists(&marker)
                    .map_err(|e| self.fail("get_attr", &normalized, e))?;
                if is_dir {
                    Ok(self.dir_attr())
                } else {
                    Err(VfsError::not_found(normalized))
                }
            }
            Err(e) => Err(self.fail("get_attr", &normalized, e)),
        }
    }

    /// Create a directory. Succeeds if it already exists.
    #[tracing::instrument(skip(self), name = "kvfs.mkdir")]
    pub fn mkdir(&self, path: &str) -> VfsResult<()> {
        let normalized = path::normalize(path);
        if normalized.is_empty() {
            return Ok(());
        }
        let marker = self.keys.dir_prefix(&normalized);
        self.store
            .put(&marker, &[])
            .map_err(|e| self.fail("mkdir", &normalized, e))
    }

    /// Create a directory and every missing ancestor.
    #[tracing::instrument(skip(self), name = "kvfs.mkdir_all")]
    pub fn mkdir_all(&self, path: &str) -> VfsResult<()> {
        let normalized = path::normalize(path);
        let mut current = String::new();
        for segment in normalized.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push(SEPARATOR);
            }
            current.push_str(segment);
            self.mkdir(&current)?;
        }
        Ok(())
    }

    /// Remove a directory and everything below it.
    ///
    /// A single prefix delete; not rolled back if the store fails part way.
    #[tracing::instrument(skip(self), name = "kvfs.rmdir")]
    pub fn rmdir(&self, path: &str) -> VfsResult<()> {
        let normalized = path::normalize(path);
        if normalized.is_empty() {
            return Err(VfsError::invalid_path(path));
        }
        let prefix = self.keys.dir_prefix(&normalized);
        self.store
            .delete_tree(&prefix)
            .map_err(|e| self.fail("rmdir", &normalized, e))?;
        tracing::debug!("removed tree {}", prefix);
        Ok(())
    }

    /// Delete a single file.
    #[tracing::instrument(skip(self), name = "kvfs.unlink")]
    pub fn unlink(&self, path: &str) -> VfsResult<()> {
        let (normalized, key) = self.file_key(path)?;
        self.store
            .delete(&key)
            .map_err(|e| self.fail("unlink", &normalized, e))
    }

    /// Immediate children of a directory.
    #[tracing::instrument(skip(self), name = "kvfs.open_dir")]
    pub fn open_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let normalized = path::normalize(path);
        let prefix = self.keys.dir_prefix(&normalized);
        let pairs = self
            .store
            .list(&prefix)
            .map_err(|e| self.fail("open_dir", &normalized, e))?;

        if !normalized.is_empty() && !pairs.iter().any(|kv| kv.key == prefix) {
            return Err(VfsError::not_found(normalized));
        }

        let mut entries: Vec<DirEntry> = pairs
            .iter()
            .filter_map(|kv| path::child_of(&prefix, &kv.key))
            .map(|(name, kind)| DirEntry::new(name, kind))
            .collect();
        let order = self.options.listing;
        entries.sort_by(|a, b| order.compare(a, b));

        tracing::debug!("{} entries under {:?}", entries.len(), prefix);
        Ok(entries)
    }

    /// Move a file, or a directory with its whole subtree.
    ///
    /// Copy then delete. A reader can see both names in between, and a crash
    /// there leaves both. Failures after the first write are `PartialFailure`.
    #[tracing::instrument(skip(self), name = "kvfs.rename")]
    pub fn rename(&self, old_path: &str, new_path: &str) -> VfsResult<()> {
        let (old, old_key) = self.file_key(old_path)?;
        let (new, new_key) = self.file_key(new_path)?;
        if old == new {
            return Ok(());
        }

        match self.store.get(&old_key) {
            Ok(value) => self.rename_file(&old, &old_key, &new_key, &value),
            Err(e) if e.is_not_found() => {
                let old_prefix = self.keys.dir_prefix(&old);
                let is_dir = self
                    .store
                    .exists(&old_prefix)
                    .map_err(|e| self.fail("rename", &old, e))?;
                if !is_dir {
                    return Err(VfsError::not_found(old));
                }
                let new_prefix = self.keys.dir_prefix(&new);
                self.rename_dir(&old, &old_prefix, &new_prefix)
            }
            Err(e) => Err(self.fail("rename", &old, e)),
        }
    }

    fn rename_file(&self, old: &str, old_key: &str, new_key: &str, value: &[u8]) -> VfsResult<()> {
        let previous = match self.store.get(new_key) {
            Ok(prev) => Some(prev),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(self.fail("rename", old, e)),
        };

        self.store
            .put(new_key, value)
            .map_err(|e| self.fail("rename", old, e))?;

        match self.store.delete(old_key) {
            Ok(()) => Ok(()),
            // Someone else removed it; the move still happened.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => {
                let undo = match &previous {
                    Some(prev) => self.store.put(new_key, prev),
                    None => self.store.delete(new_key),
                };
                let detail = match undo {
                    Ok(()) => format!("deleting {old_key} failed ({e}); {new_key} restored"),
                    Err(undo_err) => format!(
                        "deleting {old_key} failed ({e}); restoring {new_key} also failed ({undo_err})"
                    ),
                };
                tracing::error!("rename {}: {}", old, detail);
                Err(VfsError::partial("rename", old, detail))
            }
        }
    }

    fn rename_dir(&self, old: &str, old_prefix: &str, new_prefix: &str) -> VfsResult<()> {
        if new_prefix.starts_with(old_prefix) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {old_prefix} into itself ({new_prefix})"
            )));
        }

        let pairs = self
            .store
            .list(old_prefix)
            .map_err(|e| self.fail("rename", old, e))?;

        for (copied, kv) in pairs.iter().enumerate() {
            let target = format!("{}{}", new_prefix, &kv.key[old_prefix.len()..]);
            if let Err(e) = self.store.put(&target, &kv.value) {
                if copied == 0 {
                    return Err(self.fail("rename", old, e));
                }
                let detail = format!(
                    "copied {copied} of {} keys to {new_prefix}, then failed ({e})",
                    pairs.len()
                );
                tracing::error!("rename {}: {}", old, detail);
                return Err(VfsError::partial("rename", old, detail));
            }
        }

        if let Err(e) = self.store.delete_tree(old_prefix) {
            let detail = format!(
                "copied {} keys to {new_prefix}, removing {old_prefix} failed ({e})",
                pairs.len()
            );
            tracing::error!("rename {}: {}", old, detail);
            return Err(VfsError::partial("rename", old, detail));
        }

        tracing::debug!("moved {} keys {} -> {}", pairs.len(), old_prefix, new_prefix);
        Ok(())
    }

    /// Key counts under a directory. No accuracy guarantee under concurrent writes.
    #[tracing::instrument(skip(self), name = "kvfs.stat_fs")]
    pub fn stat_fs(&self, path: &str) -> VfsResult<StatFs> {
        let normalized = path::normalize(path);
        let prefix = self.keys.dir_prefix(&normalized);
        let pairs = self
            .store
            .list(&prefix)
            .map_err(|e| self.fail("stat_fs", &normalized, e))?;

        let mut stats = StatFs::default();
        for kv in &pairs {
            stats.entry_count += 1;
            if kv.key.ends_with(SEPARATOR) {
                stats.dir_count += 1;
            } else {
                stats.file_count += 1;
            }
        }
        Ok(stats)
    }

    /// Every key below a directory as `(relative path, kind)`, unfiltered.
    #[tracing::instrument(skip(self), name = "kvfs.raw_list")]
    pub fn raw_list(&self, path: &str) -> VfsResult<Vec<(String, EntryKind)>> {
        let normalized = path::normalize(path);
        let prefix = self.keys.dir_prefix(&normalized);
        let pairs = self
            .store
            .list(&prefix)
            .map_err(|e| self.fail("raw_list", &normalized, e))?;

        Ok(pairs
            .iter()
            .filter_map(|kv| {
                let rest = &kv.key[prefix.len()..];
                match rest.strip_suffix(SEPARATOR) {
                    Some(dir) => Some((dir.to_string(), EntryKind::Directory)),
                    None if rest.is_empty() => None,
                    None => Some((rest.to_string(), EntryKind::File)),
                }
            })
            .filter(|(name, _)| !name.is_empty())
            .collect())
    }

    fn file_key(&self, path: &str) -> VfsResult<(String, String)> {
        let normalized = path::normalize(path);
        let key = self.keys.to_key(&normalized, EntryKind::File)?;
        Ok((normalized, key))
    }

    fn dir_attr(&self) -> FileAttr {
        FileAttr {
            kind: EntryKind::Directory,
            attrs: Attributes {
                mode: S_IFDIR | self.options.dir_mode,
                ..Attributes::default()
            },
        }
    }

    fn fail(&self, op: &'static str, path: &str, e: StoreError) -> VfsError {
        if e.is_not_found() {
            return VfsError::not_found(path);
        }
        tracing::error!("{} {}: store failure: {}", op, path, e);
        VfsError::Io(e)
    }
}
