//! Mountable filesystem adapter.
//!
//! [`PathFilesystem`] is the synchronous callback contract an OS mount
//! binding drives: path-based calls that answer with a status code instead
//! of a rich error. [`KvMount`] implements it over a [`KvFs`] and does
//! nothing but translate; recovery and retries are the caller's business.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vfs::{FileAttr, FileHandle, KvFs, VfsError};
use crate::vfs::attr::{S_IFDIR, S_IFREG};

/// Status code returned by mount callbacks.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    /// No such file or directory.
    ENOENT,
    /// Store failure, or a multi-key operation left half done.
    EIO,
    /// Empty or malformed name.
    EACCES,
    /// Write past the file size limit.
    EFBIG,
}

impl Status {
    /// POSIX errno value (0 for `Ok`).
    pub fn errno(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::ENOENT => 2,
            Status::EIO => 5,
            Status::EACCES => 13,
            Status::EFBIG => 27,
        }
    }

    /// Returns true for `Ok`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::ENOENT => "ENOENT",
            Status::EIO => "EIO",
            Status::EACCES => "EACCES",
            Status::EFBIG => "EFBIG",
        };
        write!(f, "{}", name)
    }
}

impl From<&VfsError> for Status {
    fn from(e: &VfsError) -> Self {
        match e {
            VfsError::NotFound(_) => Status::ENOENT,
            VfsError::InvalidPath(_) => Status::EACCES,
            VfsError::TooLarge { .. } => Status::EFBIG,
            VfsError::Io(_) | VfsError::PartialFailure { .. } => Status::EIO,
        }
    }
}

impl From<VfsError> for Status {
    fn from(e: VfsError) -> Self {
        Status::from(&e)
    }
}

/// Attributes in the shape a mount binding wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountAttr {
    /// Type and permission bits.
    pub mode: u32,
    pub size: u64,
    /// Creation time, Unix seconds (0 if unknown).
    pub ctime: u64,
    /// Modification time, Unix seconds (0 if unknown).
    pub mtime: u64,
}

impl MountAttr {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFDIR == S_IFDIR
    }
}

impl From<&FileAttr> for MountAttr {
    fn from(attr: &FileAttr) -> Self {
        Self {
            mode: attr.attrs.mode,
            size: attr.size(),
            ctime: attr.attrs.created_at,
            mtime: attr.attrs.modified_at,
        }
    }
}

/// One `open_dir` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountDirEntry {
    pub name: String,
    /// `S_IFDIR` or `S_IFREG`.
    pub mode: u32,
}

/// `stat_fs` answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatfsOut {
    /// Keys under the queried path.
    pub files: u64,
}

/// Synchronous, path-based filesystem callbacks.
///
/// Implementations must be callable from any number of threads at once.
pub trait PathFilesystem: Send + Sync {
    /// Filesystem name shown to the mount binding.
    fn name(&self) -> &str;

    /// Create or truncate a file.
    fn create(&self, name: &str, mode: u32) -> Result<FileHandle, Status>;

    /// Open an existing file.
    fn open(&self, name: &str) -> Result<FileHandle, Status>;

    /// List a directory.
    fn open_dir(&self, name: &str) -> Result<Vec<MountDirEntry>, Status>;

    /// Attributes of a file or directory.
    fn get_attr(&self, name: &str) -> Result<MountAttr, Status>;

    /// Create a directory.
    fn mkdir(&self, name: &str, mode: u32) -> Result<(), Status>;

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), Status>;

    /// Remove a directory recursively.
    fn rmdir(&self, name: &str) -> Result<(), Status>;

    /// Delete a file.
    fn unlink(&self, name: &str) -> Result<(), Status>;

    /// Shrink a file.
    fn truncate(&self, name: &str, size: u64) -> Result<(), Status>;

    fn stat_fs(&self, name: &str) -> Result<StatfsOut, Status>;

    /// Read from an open file.
    fn read(&self, file: &FileHandle, offset: u64, size: usize) -> Result<Vec<u8>, Status>;

    /// Write to an open file; see [`KvFs::write`] for the exact semantics.
    fn write(&self, file: &FileHandle, offset: u64, data: &[u8]) -> Result<usize, Status>;

    /// Attributes of an open file.
    fn file_attr(&self, file: &FileHandle) -> Result<MountAttr, Status>;
}

/// [`PathFilesystem`] over a [`KvFs`].
#[derive(Debug, Clone)]
pub struct KvMount {
    fs: Arc<KvFs>,
}

impl KvMount {
    pub fn new(fs: Arc<KvFs>) -> Self {
        Self { fs }
    }

    /// The engine behind this mount.
    pub fn fs(&self) -> &Arc<KvFs> {
        &self.fs
    }
}

impl PathFilesystem for KvMount {
    fn name(&self) -> &str {
        "kvfs"
    }

    fn create(&self, name: &str, mode: u32) -> Result<FileHandle, Status> {
        if name.is_empty() {
            return Err(Status::EACCES);
        }
        Ok(self.fs.create_with_mode(name, mode)?)
    }

    fn open(&self, name: &str) -> Result<FileHandle, Status> {
        Ok(self.fs.open(name)?)
    }

    fn open_dir(&self, name: &str) -> Result<Vec<MountDirEntry>, Status> {
        let entries = self.fs.open_dir(name)?;
        Ok(entries
            .into_iter()
            .map(|e| MountDirEntry {
                mode: if e.is_dir() { S_IFDIR } else { S_IFREG },
                name: e.name,
            })
            .collect())
    }

    fn get_attr(&self, name: &str) -> Result<MountAttr, Status> {
        let attr = self.fs.get_attr(name)?;
        Ok(MountAttr::from(&attr))
    }

    fn mkdir(&self, name: &str, _mode: u32) -> Result<(), Status> {
        if name.is_empty() {
            return Err(Status::ENOENT);
        }
        Ok(self.fs.mkdir(name)?)
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<(), Status> {
        Ok(self.fs.rename(old_name, new_name)?)
    }

    fn rmdir(&self, name: &str) -> Result<(), Status> {
        Ok(self.fs.rmdir(name)?)
    }

    fn unlink(&self, name: &str) -> Result<(), Status> {
        match self.fs.unlink(name) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("unlink {}: already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn truncate(&self, name: &str, size: u64) -> Result<(), Status> {
        Ok(self.fs.truncate(name, size)?)
    }

    fn stat_fs(&self, name: &str) -> Result<StatfsOut, Status> {
        let stats = self.fs.stat_fs(name)?;
        Ok(StatfsOut {
            files: stats.entry_count,
        })
    }

    fn read(&self, file: &FileHandle, offset: u64, size: usize) -> Result<Vec<u8>, Status> {
        Ok(self.fs.read(file, offset, size)?)
    }

    fn write(&self, file: &FileHandle, offset: u64, data: &[u8]) -> Result<usize, Status> {
        Ok(self.fs.write(file, offset, data)?)
    }

    fn file_attr(&self, file: &FileHandle) -> Result<MountAttr, Status> {
        self.get_attr(&file.path)
    }
}
