//! Ways to consume a [`KvFs`](crate::vfs::KvFs) from outside the engine.
//!
//! - [`mount`] - status-code callbacks for an OS mount binding
//! - [`fuse`] - the kernel FUSE binding over those callbacks (feature `fuse`)
//! - [`tree`] - open/stat/read_dir for in-process tree walkers
//! - [`easy`] - whole-file helpers for the editor

pub mod easy;
pub mod fuse;
pub mod mount;
pub mod tree;

pub use easy::{EasyFs, FileInfo, FileTree};
#[cfg(feature = "fuse")]
pub use fuse::KvFuse;
pub use mount::{KvMount, MountAttr, MountDirEntry, PathFilesystem, Status, StatfsOut};
pub use tree::{DirNode, FileNode, Node, NodeInfo, TreeEntry, TreeFs, TreeRead};
