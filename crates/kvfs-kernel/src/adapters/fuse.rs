//! Kernel FUSE binding (feature `fuse`).
//!
//! [`KvFuse`] drives a [`KvMount`] from `fuser` callbacks. The kernel speaks
//! inodes, the mount adapter speaks paths, so an [`InodeTable`] hands out a
//! stable number per path seen through `lookup`, `readdir`, `create` or
//! `mkdir`. Attributes are always fetched fresh from the engine.
//!
//! Without the feature, [`mount`] returns `ErrorKind::Unsupported`.

use std::io;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "fuse")]
use std::collections::HashMap;
#[cfg(feature = "fuse")]
use std::ffi::OsStr;
#[cfg(feature = "fuse")]
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(feature = "fuse")]
use super::mount::{KvMount, MountAttr, PathFilesystem, Status};
#[cfg(feature = "fuse")]
use crate::vfs::FileHandle;
#[cfg(feature = "fuse")]
use crate::vfs::path;
use crate::vfs::KvFs;

#[cfg(feature = "fuse")]
const ROOT_INODE: u64 = 1;
#[cfg(feature = "fuse")]
const TTL: Duration = Duration::from_secs(1);
#[cfg(feature = "fuse")]
const BLOCK_SIZE: u32 = 512;

/// Mount `fs` at `at` and serve requests until it is unmounted.
///
/// Blocks the calling thread.
pub fn mount(fs: Arc<KvFs>, at: &Path) -> io::Result<()> {
    #[cfg(feature = "fuse")]
    {
        let filesystem = KvFuse::new(KvMount::new(fs));
        let options = [
            fuser::MountOption::FSName(filesystem.mount.name().to_owned()),
            fuser::MountOption::AutoUnmount,
        ];
        tracing::info!("mounting {:?} at {}", filesystem.mount.fs(), at.display());
        fuser::mount2(filesystem, at, &options)
    }
    #[cfg(not(feature = "fuse"))]
    {
        let _ = fs;
        let _ = at;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "fuse support disabled; rebuild kvfs-kernel with --features fuse",
        ))
    }
}

/// `fuser::Filesystem` over a [`KvMount`].
#[cfg(feature = "fuse")]
#[derive(Debug)]
pub struct KvFuse {
    mount: KvMount,
    inodes: InodeTable,
    handles: HashMap<u64, FileHandle>,
    next_handle: u64,
}

#[cfg(feature = "fuse")]
impl KvFuse {
    pub fn new(mount: KvMount) -> Self {
        Self {
            mount,
            inodes: InodeTable::new(),
            handles: HashMap::new(),
            next_handle: 1,
        }
    }

    fn path(&self, inode: u64) -> Result<String, Status> {
        self.inodes
            .path_for(inode)
            .map(str::to_owned)
            .ok_or(Status::ENOENT)
    }

    fn child(&self, parent: u64, name: &OsStr) -> Result<String, Status> {
        let parent = self.path(parent)?;
        let name = name.to_str().ok_or(Status::EACCES)?;
        Ok(path::join(&parent, name))
    }

    /// Register `path` and build its kernel attributes.
    fn entry(&mut self, req: &fuser::Request<'_>, path: &str) -> Result<fuser::FileAttr, Status> {
        let attr = self.mount.get_attr(path)?;
        let inode = self.inodes.insert(path);
        Ok(file_attr(inode, &attr, req.uid(), req.gid()))
    }

    fn open_handle(&mut self, handle: FileHandle) -> u64 {
        let fh = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(fh, handle);
        fh
    }
}

#[cfg(feature = "fuse")]
fn system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(feature = "fuse")]
fn file_kind(is_dir: bool) -> fuser::FileType {
    if is_dir {
        fuser::FileType::Directory
    } else {
        fuser::FileType::RegularFile
    }
}

#[cfg(feature = "fuse")]
fn file_attr(inode: u64, attr: &MountAttr, uid: u32, gid: u32) -> fuser::FileAttr {
    let ctime = system_time(attr.ctime);
    let mtime = system_time(attr.mtime);
    fuser::FileAttr {
        ino: inode,
        size: attr.size,
        blocks: attr.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: mtime,
        mtime,
        ctime,
        crtime: ctime,
        kind: file_kind(attr.is_dir()),
        perm: (attr.mode & 0o7777) as u16,
        nlink: if attr.is_dir() { 2 } else { 1 },
        uid,
        gid,
        rdev: 0,
        flags: 0,
        blksize: BLOCK_SIZE,
    }
}

#[cfg(feature = "fuse")]
impl fuser::Filesystem for KvFuse {
    fn lookup(
        &mut self,
        req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        let result = self
            .child(parent, name)
            .and_then(|path| self.entry(req, &path));
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn getattr(
        &mut self,
        req: &fuser::Request<'_>,
        inode: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        let result = self.path(inode).and_then(|path| self.mount.get_attr(&path));
        match result {
            Ok(attr) => reply.attr(&TTL, &file_attr(inode, &attr, req.uid(), req.gid())),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn setattr(
        &mut self,
        req: &fuser::Request<'_>,
        inode: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: fuser::ReplyAttr,
    ) {
        // Only size changes reach the store; permissions are not enforced.
        let result = self.path(inode).and_then(|path| {
            if let Some(size) = size {
                self.mount.truncate(&path, size)?;
            }
            self.mount.get_attr(&path)
        });
        match result {
            Ok(attr) => reply.attr(&TTL, &file_attr(inode, &attr, req.uid(), req.gid())),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: fuser::ReplyEntry,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            self.mount.mkdir(&path, mode & !umask)?;
            self.entry(req, &path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn unlink(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            self.mount.unlink(&path)?;
            self.inodes.remove_tree(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn rmdir(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            self.mount.rmdir(&path)?;
            self.inodes.remove_tree(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        new_parent: u64,
        new_name: &OsStr,
        _flags: u32,
        reply: fuser::ReplyEmpty,
    ) {
        let result = self.child(parent, name).and_then(|old| {
            let new = self.child(new_parent, new_name)?;
            self.mount.rename(&old, &new)?;
            self.inodes.rename(&old, &new);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn create(
        &mut self,
        req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            let handle = self.mount.create(&path, mode & !umask)?;
            let attr = self.entry(req, &path)?;
            Ok((attr, self.open_handle(handle)))
        });
        match result {
            Ok((attr, fh)) => reply.created(&TTL, &attr, 0, fh, 0),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn open(
        &mut self,
        _req: &fuser::Request<'_>,
        inode: u64,
        _flags: i32,
        reply: fuser::ReplyOpen,
    ) {
        let result = self.path(inode).and_then(|path| self.mount.open(&path));
        match result {
            Ok(handle) => reply.opened(self.open_handle(handle), 0),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        _inode: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        let Some(handle) = self.handles.get(&fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.mount.read(handle, offset, size as usize) {
            Ok(data) => reply.data(&data),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &fuser::Request<'_>,
        _inode: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        let Some(handle) = self.handles.get(&fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.mount.write(handle, offset, data) {
            Ok(written) => reply.written(u32::try_from(written).unwrap_or(u32::MAX)),
            Err(status) => reply.error(status.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        _inode: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        self.handles.remove(&fh);
        reply.ok();
    }

    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        inode: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let result = self.path(inode).and_then(|path| {
            let entries = self.mount.open_dir(&path)?;
            Ok((path, entries))
        });
        let (dir, entries) = match result {
            Ok(listing) => listing,
            Err(status) => {
                reply.error(status.errno());
                return;
            }
        };

        let parent = self
            .inodes
            .inode_for(&path::split(&dir).0)
            .unwrap_or(ROOT_INODE);
        let mut listing = Vec::with_capacity(entries.len().saturating_add(2));
        listing.push((inode, fuser::FileType::Directory, ".".to_owned()));
        listing.push((parent, fuser::FileType::Directory, "..".to_owned()));
        for entry in entries {
            let child = self.inodes.insert(&path::join(&dir, &entry.name));
            let is_dir = entry.mode & crate::vfs::attr::S_IFDIR != 0;
            listing.push((child, file_kind(is_dir), entry.name));
        }

        let start = usize::try_from(offset).unwrap_or(0);
        for (idx, (ino, kind, name)) in listing.into_iter().enumerate().skip(start) {
            if reply.add(ino, (idx + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &fuser::Request<'_>, _inode: u64, reply: fuser::ReplyStatfs) {
        match self.mount.stat_fs("") {
            Ok(out) => reply.statfs(0, 0, 0, out.files, 0, BLOCK_SIZE, 255, BLOCK_SIZE),
            Err(status) => reply.error(status.errno()),
        }
    }
}

/// Stable inode numbers for normalized paths. The root (`""`) is inode 1.
#[cfg(feature = "fuse")]
#[derive(Debug)]
struct InodeTable {
    by_inode: HashMap<u64, String>,
    by_path: HashMap<String, u64>,
    next_inode: u64,
}

#[cfg(feature = "fuse")]
impl InodeTable {
    fn new() -> Self {
        let mut table = Self {
            by_inode: HashMap::new(),
            by_path: HashMap::new(),
            next_inode: ROOT_INODE + 1,
        };
        table.by_inode.insert(ROOT_INODE, String::new());
        table.by_path.insert(String::new(), ROOT_INODE);
        table
    }

    fn insert(&mut self, path: &str) -> u64 {
        if let Some(existing) = self.by_path.get(path) {
            return *existing;
        }
        let inode = self.next_inode;
        self.next_inode = self.next_inode.saturating_add(1);
        self.by_inode.insert(inode, path.to_owned());
        self.by_path.insert(path.to_owned(), inode);
        inode
    }

    fn path_for(&self, inode: u64) -> Option<&str> {
        self.by_inode.get(&inode).map(String::as_str)
    }

    fn inode_for(&self, path: &str) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    /// Paths equal to `path` or below it.
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = format!("{path}/");
        self.by_path
            .keys()
            .filter(|p| p.as_str() == path || p.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn remove_tree(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        for p in self.subtree(path) {
            if let Some(inode) = self.by_path.remove(&p) {
                self.by_inode.remove(&inode);
            }
        }
    }

    /// Move `old` and everything below it to `new`, keeping inode numbers.
    fn rename(&mut self, old: &str, new: &str) {
        if old.is_empty() || old == new {
            return;
        }
        self.remove_tree(new);
        for p in self.subtree(old) {
            if let Some(inode) = self.by_path.remove(&p) {
                let moved = format!("{new}{}", &p[old.len()..]);
                self.by_inode.insert(inode, moved.clone());
                self.by_path.insert(moved, inode);
            }
        }
    }
}

#[cfg(all(test, feature = "fuse"))]
mod tests {
    use super::*;

    #[test]
    fn test_inode_table_root_and_insert() {
        let mut table = InodeTable::new();
        assert_eq!(table.path_for(ROOT_INODE), Some(""));

        let a = table.insert("src");
        assert_eq!(a, ROOT_INODE + 1);
        assert_eq!(table.insert("src"), a);
        assert_eq!(table.inode_for("src"), Some(a));
        assert_ne!(table.insert("src/a.txt"), a);
    }

    #[test]
    fn test_inode_table_remove_tree() {
        let mut table = InodeTable::new();
        let src = table.insert("src");
        table.insert("src/js");
        table.insert("src/js/x.js");
        let other = table.insert("srcx");

        table.remove_tree("src");
        assert!(table.path_for(src).is_none());
        assert!(table.inode_for("src/js/x.js").is_none());
        assert_eq!(table.path_for(other), Some("srcx"));

        table.remove_tree("");
        assert_eq!(table.path_for(ROOT_INODE), Some(""));
    }

    #[test]
    fn test_inode_table_rename_keeps_numbers() {
        let mut table = InodeTable::new();
        let src = table.insert("src");
        let x = table.insert("src/js/x.js");
        let stale = table.insert("lib");

        table.rename("src", "lib");
        assert_eq!(table.path_for(src), Some("lib"));
        assert_eq!(table.path_for(x), Some("lib/js/x.js"));
        assert!(table.path_for(stale).is_none());
        assert!(table.inode_for("src").is_none());
    }

    #[test]
    fn test_file_attr_conversion() {
        let attr = MountAttr {
            mode: crate::vfs::attr::S_IFREG | 0o640,
            size: 1025,
            ctime: 10,
            mtime: 20,
        };
        let out = file_attr(7, &attr, 1000, 1000);
        assert_eq!(out.ino, 7);
        assert_eq!(out.kind, fuser::FileType::RegularFile);
        assert_eq!(out.perm, 0o640);
        assert_eq!(out.blocks, 3);
        assert_eq!(out.mtime, UNIX_EPOCH + Duration::from_secs(20));
        assert_eq!(out.nlink, 1);
    }
}

#[cfg(all(test, not(feature = "fuse")))]
mod tests {
    use super::*;
    use kvfs_store::MemoryStore;

    #[test]
    fn test_mount_without_feature_is_unsupported() {
        let fs = Arc::new(KvFs::new(Arc::new(MemoryStore::new())));
        let err = mount(fs, Path::new("/mnt/kvfs")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
