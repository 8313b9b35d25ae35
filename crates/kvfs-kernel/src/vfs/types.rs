//! Core VFS types.

use serde::{Deserialize, Serialize};

use super::attr::Attributes;
use super::path::EntryKind;

/// Entry attributes as resolved by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Entry type.
    pub kind: EntryKind,
    /// Decoded header (synthesized for directories).
    pub attrs: Attributes,
}

impl FileAttr {
    /// Size in bytes (0 for directories).
    pub fn size(&self) -> u64 {
        self.attrs.size
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: EntryKind,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Directory)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Key counts under a directory prefix. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFs {
    /// Every key under the prefix, including the directory's own marker.
    pub entry_count: u64,
    /// File keys.
    pub file_count: u64,
    /// Directory marker keys.
    pub dir_count: u64,
}

/// An open file.
///
/// Holds no content; every read and write goes to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    /// Normalized logical path.
    pub path: String,
    /// Store key.
    pub key: String,
}

impl FileHandle {
    pub(crate) fn new(path: String, key: String) -> Self {
        Self { path, key }
    }

    /// File name (last path segment).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
