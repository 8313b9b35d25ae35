//! Filesystem engine over a flat key-value store.
//!
//! Key components:
//!
//! - [`KvFs`] - create/open/read/write/truncate/rename/unlink/mkdir/rmdir/list/stat
//! - [`KeyCodec`] - logical paths to store keys (directories end in `/`)
//! - [`AttributeCodec`] / [`HeaderV1`] - fixed-width metadata header in front of content
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: operations take paths; handles are a path and a key.
//! - **Directory markers**: a directory exists when `path/` is a key. The root
//!   always exists and has no marker.
//! - **Constant content offset**: content starts right after the header, whose
//!   width is fixed by its version, so binary content is never misparsed.
//! - **Single-key atomicity only**: `rename` and `rmdir` are several store calls
//!   and report `PartialFailure` when they stop half way.

pub mod attr;
mod engine;
mod error;
pub mod path;
mod reader;
mod types;

pub use attr::{AttributeCodec, Attributes, HeaderV1};
pub use engine::{KvFs, KvFsOptions, ListingOrder};
pub use error::{VfsError, VfsResult};
pub use path::{EntryKind, KeyCodec};
pub use reader::HandleReader;
pub use types::{DirEntry, FileAttr, FileHandle, StatFs};
