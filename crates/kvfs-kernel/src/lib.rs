//! # kvfs-kernel
//!
//! A hierarchical filesystem on top of a flat key-value store.
//!
//! The store only knows single keys and prefixes. Directories, attributes and
//! renames are all conventions layered on top:
//! - a directory is a key ending in `/`
//! - a file value is a fixed-width attribute header followed by the content
//! - rename is copy then delete, and can be observed half done
//!
//! [`vfs::KvFs`] is the engine. [`adapters`] expose it as mount callbacks, a
//! read-mostly tree, and whole-file helpers. [`namespace::ProjectSpaces`] hands
//! out one engine per project bucket.

pub mod adapters;
pub mod config;
pub mod namespace;
pub mod vfs;

pub use adapters::{EasyFs, KvMount, PathFilesystem, Status, TreeFs, TreeRead};
pub use config::{ConfigError, KvfsConfig};
pub use namespace::{Bucket, ProjectSpaces};
pub use vfs::{
    Attributes, DirEntry, EntryKind, FileAttr, FileHandle, KvFs, KvFsOptions, ListingOrder, StatFs,
    VfsError, VfsResult,
};
