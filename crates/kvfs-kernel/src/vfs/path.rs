//! Path codec: logical paths to store keys and back.
//!
//! Files are stored under their normalized path. Directories are stored under
//! the path plus a trailing `/`, which doubles as the directory's existence
//! marker. The root directory is the namespace root prefix itself and never
//! needs a marker.

use serde::{Deserialize, Serialize};

use super::error::{VfsError, VfsResult};

/// Path separator, in both logical paths and store keys.
pub const SEPARATOR: char = '/';

/// What a key stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Normalize a path: drop leading/trailing and repeated `/`, resolve `.` and `..`.
///
/// `..` never climbs above the root. The root normalizes to `""`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Split a path into `(parent_dir, name)`, both normalized.
///
/// The root splits into `("", "")`.
pub fn split(path: &str) -> (String, String) {
    let normalized = normalize(path);
    match normalized.rfind(SEPARATOR) {
        Some(idx) => (
            normalized[..idx].to_string(),
            normalized[idx + 1..].to_string(),
        ),
        None => (String::new(), normalized),
    }
}

/// Join a directory and a child name into a normalized path.
pub fn join(dir: &str, name: &str) -> String {
    normalize(&format!("{dir}/{name}"))
}

/// Name and kind of `key` if it is an immediate child of the directory key `parent_key`.
///
/// The remainder after `parent_key` must not contain another separator, except a
/// single trailing one marking a child directory. The directory's own marker and
/// deeper descendants yield `None`.
pub fn child_of<'k>(parent_key: &str, key: &'k str) -> Option<(&'k str, EntryKind)> {
    let rest = key.strip_prefix(parent_key)?;
    if rest.is_empty() {
        return None;
    }
    match rest.find(SEPARATOR) {
        None => Some((rest, EntryKind::File)),
        Some(idx) if idx > 0 && idx == rest.len() - 1 => Some((&rest[..idx], EntryKind::Directory)),
        Some(_) => None,
    }
}

/// Check whether `key` is an immediate child of the directory key `parent_key`.
pub fn is_immediate_child(parent_key: &str, key: &str) -> bool {
    child_of(parent_key, key).is_some()
}

/// Maps paths to keys within one namespace root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCodec {
    /// `""` or a normalized prefix ending in `/`.
    root: String,
}

impl KeyCodec {
    /// Create a codec whose keys all live under `root`.
    pub fn new(root: &str) -> Self {
        let normalized = normalize(root);
        let root = if normalized.is_empty() {
            normalized
        } else {
            format!("{normalized}/")
        };
        Self { root }
    }

    /// The root prefix (`""` or `"<root>/"`).
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Store key for `path` as the given kind.
    ///
    /// A file needs a non-empty name; the root can only be a directory.
    pub fn to_key(&self, path: &str, kind: EntryKind) -> VfsResult<String> {
        match kind {
            EntryKind::File => {
                let normalized = normalize(path);
                if normalized.is_empty() {
                    return Err(VfsError::invalid_path(path));
                }
                Ok(format!("{}{}", self.root, normalized))
            }
            EntryKind::Directory => Ok(self.dir_prefix(path)),
        }
    }

    /// Directory key for `path`, which is also the prefix of all its descendants.
    pub fn dir_prefix(&self, path: &str) -> String {
        let normalized = normalize(path);
        if normalized.is_empty() {
            self.root.clone()
        } else {
            format!("{}{}/", self.root, normalized)
        }
    }

    /// Logical path and kind for a store key. `None` if the key is outside the root.
    pub fn from_key(&self, key: &str) -> Option<(String, EntryKind)> {
        let rest = key.strip_prefix(self.root.as_str())?;
        match rest.strip_suffix(SEPARATOR) {
            Some(dir) => Some((dir.to_string(), EntryKind::Directory)),
            None if rest.is_empty() => Some((String::new(), EntryKind::Directory)),
            None => Some((rest.to_string(), EntryKind::File)),
        }
    }
}
