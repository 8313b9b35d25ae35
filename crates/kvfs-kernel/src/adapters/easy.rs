//! Whole-file convenience API.
//!
//! What the web editor talks to: write a file as one string, read it back,
//! list a tree to a fixed depth. Built on the engine the same way the mount
//! adapter is, so both see identical semantics.

use std::sync::Arc;

use kvfs_store::StoreError;
use serde::{Deserialize, Serialize};

use crate::vfs::path;
use crate::vfs::{KvFs, VfsError, VfsResult};

/// A file (or directory) as the editor sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    /// Full path, as the caller spelled it.
    pub path: String,
    /// Parent directory, spelled like `path` (`"/src"` for `"/src/a.md"`).
    pub dir_path: String,
    pub is_dir: bool,
    /// Unix seconds, 0 if unknown.
    pub created_at: i64,
    /// Unix seconds, 0 if unknown.
    pub modify_at: i64,
    /// File content; empty for directories and tree listings.
    pub body: String,
}

/// A directory listing, recursively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    #[serde(flatten)]
    pub file: FileInfo,
    pub items: Vec<FileTree>,
}

/// Whole-file operations over a [`KvFs`].
#[derive(Debug, Clone)]
pub struct EasyFs {
    fs: Arc<KvFs>,
}

impl EasyFs {
    pub fn new(fs: Arc<KvFs>) -> Self {
        Self { fs }
    }

    pub fn mkdir(&self, name: &str) -> VfsResult<()> {
        self.fs.mkdir(name)
    }

    /// Remove a directory and everything in it.
    pub fn rm_dir(&self, name: &str) -> VfsResult<()> {
        self.fs.rmdir(name)
    }

    /// Delete a file. Deleting a missing file succeeds.
    pub fn rm_file(&self, name: &str) -> VfsResult<()> {
        match self.fs.unlink(name) {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Read a whole file. Invalid UTF-8 is replaced.
    pub fn get_file(&self, path: &str) -> VfsResult<FileInfo> {
        let handle = self.fs.open(path)?;
        let attr = self.fs.get_attr(&handle.path)?;
        let body = self.fs.read(&handle, 0, usize::MAX)?;

        Ok(FileInfo {
            name: path::split(path).1,
            path: path.to_string(),
            dir_path: parent_path(path),
            is_dir: attr.is_dir(),
            created_at: attr.attrs.created_at as i64,
            modify_at: attr.attrs.modified_at as i64,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    /// Write a whole file, replacing any previous content. Parent directories are created.
    #[tracing::instrument(skip(self, content), fields(len = content.len()), name = "kvfs.write_file")]
    pub fn write_file(&self, path: &str, content: &str) -> VfsResult<()> {
        let (dir, name) = path::split(path);
        if name.is_empty() {
            return Err(VfsError::invalid_path(path));
        }
        if !dir.is_empty() {
            self.fs.mkdir_all(&dir)?;
        }

        let handle = self.fs.create(path)?;
        self.fs.write(&handle, 0, content.as_bytes())?;
        Ok(())
    }

    /// Directory tree under `base`, `depth` levels deep. Depth 0 is just the base node.
    pub fn file_tree(&self, base: &str, depth: usize) -> VfsResult<FileTree> {
        let mut tree = FileTree {
            file: FileInfo {
                name: path::split(base).1,
                path: base.to_string(),
                dir_path: base.to_string(),
                is_dir: true,
                ..FileInfo::default()
            },
            items: Vec::new(),
        };
        if depth == 0 {
            return Ok(tree);
        }

        for entry in self.fs.open_dir(base)? {
            let child = child_path(base, &entry.name);
            if entry.is_dir() {
                tree.items.push(self.file_tree(&child, depth - 1)?);
            } else {
                tree.items.push(FileTree {
                    file: FileInfo {
                        name: entry.name,
                        dir_path: parent_path(&child),
                        path: child,
                        ..FileInfo::default()
                    },
                    items: Vec::new(),
                });
            }
        }
        Ok(tree)
    }

    /// [`file_tree`](Self::file_tree) as JSON.
    pub fn file_tree_json(&self, base: &str, depth: usize) -> VfsResult<String> {
        let tree = self.file_tree(base, depth)?;
        serde_json::to_string(&tree).map_err(|e| VfsError::Io(StoreError::other(e.to_string())))
    }
}

/// Everything before the last segment, keeping the caller's leading `/`.
fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Join keeping the caller's leading `/`, if any.
fn child_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), name)
    }
}
