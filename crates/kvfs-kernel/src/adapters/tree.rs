//! Hierarchical read adapter.
//!
//! A narrow open/stat/read_dir contract for in-process consumers that walk
//! trees (content scanning, asset serving, export) and never mount anything.
//! All decoding stays in the engine; this module only delegates.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::vfs::path;
use crate::vfs::{FileAttr, HandleReader, KvFs, VfsError, VfsResult};

/// Metadata of an opened node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    /// Last path segment (`"/"` for the root).
    pub name: String,
    pub size: u64,
    /// `None` when the header carries no timestamp.
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
}

impl NodeInfo {
    fn from_attr(normalized: &str, attr: &FileAttr) -> Self {
        Self {
            name: display_name(normalized),
            size: attr.size(),
            modified: attr.attrs.modified(),
            is_dir: attr.is_dir(),
        }
    }
}

/// One directory entry, with enough to recurse into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub name: String,
    /// Normalized path from the namespace root.
    pub path: String,
    pub is_dir: bool,
}

/// An open file. Reads go to the store on every call.
#[derive(Debug)]
pub struct FileNode {
    reader: HandleReader<Arc<KvFs>>,
    info: NodeInfo,
}

impl FileNode {
    pub fn stat(&self) -> &NodeInfo {
        &self.info
    }

    /// Everything from the current position to the end.
    pub fn read_all(&mut self) -> VfsResult<Vec<u8>> {
        self.reader.read_rest()
    }
}

impl Read for FileNode {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// An open directory: a snapshot of its entries at open time.
#[derive(Debug, Clone)]
pub struct DirNode {
    info: NodeInfo,
    entries: Vec<TreeEntry>,
}

impl DirNode {
    pub fn stat(&self) -> &NodeInfo {
        &self.info
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }
}

/// Result of [`TreeRead::open`].
#[derive(Debug)]
pub enum Node {
    File(FileNode),
    Dir(DirNode),
}

impl Node {
    pub fn stat(&self) -> &NodeInfo {
        match self {
            Node::File(f) => f.stat(),
            Node::Dir(d) => d.stat(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }

    /// Release the node. Nothing is held open in the store, so this cannot fail.
    pub fn close(self) {}
}

/// Read-mostly tree access.
pub trait TreeRead {
    /// Open a file, or a directory if no file has that name.
    fn open(&self, path: &str) -> VfsResult<Node>;

    fn stat(&self, path: &str) -> VfsResult<NodeInfo>;

    /// Immediate children of a directory.
    fn read_dir(&self, path: &str) -> VfsResult<Vec<TreeEntry>>;

    /// Whole content of a file.
    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        match self.open(path)? {
            Node::File(mut file) => file.read_all(),
            Node::Dir(_) => Err(VfsError::invalid_path(format!("{path} is a directory"))),
        }
    }

    /// Every entry below `path`, depth first, each directory followed by its contents.
    fn walk(&self, path: &str) -> VfsResult<Vec<TreeEntry>> {
        let mut out = Vec::new();
        walk_into(self, path, &mut out)?;
        Ok(out)
    }
}

fn walk_into<T: TreeRead + ?Sized>(tree: &T, dir: &str, out: &mut Vec<TreeEntry>) -> VfsResult<()> {
    for entry in tree.read_dir(dir)? {
        let recurse = entry.is_dir.then(|| entry.path.clone());
        out.push(entry);
        if let Some(sub) = recurse {
            walk_into(tree, &sub, out)?;
        }
    }
    Ok(())
}

/// [`TreeRead`] over a [`KvFs`].
#[derive(Debug, Clone)]
pub struct TreeFs {
    fs: Arc<KvFs>,
}

impl TreeFs {
    pub fn new(fs: Arc<KvFs>) -> Self {
        Self { fs }
    }

    fn open_dir_node(&self, normalized: &str) -> VfsResult<DirNode> {
        let entries = self.read_dir(normalized)?;
        Ok(DirNode {
            info: NodeInfo {
                name: display_name(normalized),
                size: 0,
                modified: None,
                is_dir: true,
            },
            entries,
        })
    }
}

impl TreeRead for TreeFs {
    fn open(&self, path: &str) -> VfsResult<Node> {
        let normalized = path::normalize(path);
        if normalized.is_empty() {
            return Ok(Node::Dir(self.open_dir_node(&normalized)?));
        }

        match self.fs.open(&normalized) {
            Ok(handle) => {
                let attr = self.fs.get_attr(&normalized)?;
                Ok(Node::File(FileNode {
                    reader: HandleReader::new(Arc::clone(&self.fs), handle),
                    info: NodeInfo::from_attr(&normalized, &attr),
                }))
            }
            Err(e) if e.is_not_found() => Ok(Node::Dir(self.open_dir_node(&normalized)?)),
            Err(e) => Err(e),
        }
    }

    fn stat(&self, path: &str) -> VfsResult<NodeInfo> {
        let normalized = path::normalize(path);
        let attr = self.fs.get_attr(&normalized)?;
        Ok(NodeInfo::from_attr(&normalized, &attr))
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<TreeEntry>> {
        let normalized = path::normalize(path);
        let entries = self.fs.open_dir(&normalized)?;
        Ok(entries
            .into_iter()
            .map(|e| TreeEntry {
                path: path::join(&normalized, &e.name),
                is_dir: e.is_dir(),
                name: e.name,
            })
            .collect())
    }
}

fn display_name(normalized: &str) -> String {
    if normalized.is_empty() {
        return "/".to_string();
    }
    path::split(normalized).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvfs_store::MemoryStore;

    fn tree() -> (Arc<KvFs>, TreeFs) {
        let fs = Arc::new(KvFs::new(Arc::new(MemoryStore::new())));
        fs.mkdir("content").unwrap();
        fs.mkdir("content/posts").unwrap();
        let h = fs.create("content/posts/hello.md").unwrap();
        fs.write(&h, 0, b"# hello").unwrap();
        let h = fs.create("content/about.md").unwrap();
        fs.write(&h, 0, b"about").unwrap();
        let h = fs.create("config.toml").unwrap();
        fs.write(&h, 0, b"title = 'x'").unwrap();
        (Arc::clone(&fs), TreeFs::new(fs))
    }

    #[test]
    fn test_open_file_and_read() {
        let (_, t) = tree();
        let node = t.open("/content/about.md").unwrap();
        assert!(!node.is_dir());
        assert_eq!(node.stat().name, "about.md");
        assert_eq!(node.stat().size, 5);
        assert!(node.stat().modified.is_some());

        let Node::File(mut file) = node else {
            panic!("expected a file");
        };
        let mut body = String::new();
        file.read_to_string(&mut body).unwrap();
        assert_eq!(body, "about");
        Node::File(file).close();
    }

    #[test]
    fn test_open_dir() {
        let (_, t) = tree();
        let Node::Dir(dir) = t.open("content").unwrap() else {
            panic!("expected a directory");
        };
        let names: Vec<_> = dir.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["posts", "about.md"]);
        assert!(dir.stat().is_dir);

        let root = t.open("/").unwrap();
        assert!(root.is_dir());
        assert_eq!(root.stat().name, "/");
        assert!(t.open("").unwrap().is_dir());
    }

    #[test]
    fn test_open_missing() {
        let (_, t) = tree();
        assert!(t.open("nope").unwrap_err().is_not_found());
        assert!(t.stat("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_helper() {
        let (_, t) = tree();
        assert_eq!(t.read("content/posts/hello.md").unwrap(), b"# hello");
        assert!(t.read("content").unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_stat() {
        let (_, t) = tree();
        let info = t.stat("content/posts").unwrap();
        assert!(info.is_dir);
        assert_eq!(info.name, "posts");
        assert_eq!(info.size, 0);

        let info = t.stat("config.toml").unwrap();
        assert!(!info.is_dir);
        assert_eq!(info.size, 11);
    }

    #[test]
    fn test_walk() {
        let (_, t) = tree();
        let paths: Vec<_> = t.walk("/").unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                "content",
                "content/posts",
                "content/posts/hello.md",
                "content/about.md",
                "config.toml",
            ]
        );
    }

    #[test]
    fn test_file_node_sees_later_writes() {
        let (fs, t) = tree();
        let Node::File(mut file) = t.open("config.toml").unwrap() else {
            panic!("expected a file");
        };
        let h = fs.open("config.toml").unwrap();
        fs.write(&h, 0, b"changed").unwrap();
        assert_eq!(file.read_all().unwrap(), b"changed");
    }

    #[test]
    fn test_file_node_read_then_read_all() {
        let (_, t) = tree();
        let Node::File(mut file) = t.open("content/posts/hello.md").unwrap() else {
            panic!("expected a file");
        };
        let mut head = [0u8; 2];
        file.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"# ");
        assert_eq!(file.read_all().unwrap(), b"hello");
        assert!(file.read_all().unwrap().is_empty());
    }
}
