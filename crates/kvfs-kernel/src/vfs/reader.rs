//! Sequential `std::io::Read` over a file handle.

use std::io::{self, Read};
use std::ops::Deref;

use super::engine::KvFs;
use super::error::VfsResult;
use super::types::FileHandle;

/// Reads a file front to back through the engine.
///
/// `F` is anything that derefs to the engine: `&KvFs` for a borrowed reader,
/// `Arc<KvFs>` for one that outlives its caller. Each `read` call fetches
/// from the store; nothing is cached between calls.
#[derive(Debug)]
pub struct HandleReader<F> {
    fs: F,
    handle: FileHandle,
    pos: u64,
}

impl<F: Deref<Target = KvFs>> HandleReader<F> {
    /// Reader starting at offset 0.
    pub fn new(fs: F, handle: FileHandle) -> Self {
        Self { fs, handle, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The handle being read.
    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    /// Up to `len` bytes from the current position; empty at end of content.
    pub fn read_chunk(&mut self, len: usize) -> VfsResult<Vec<u8>> {
        let chunk = self.fs.read(&self.handle, self.pos, len)?;
        self.pos += chunk.len() as u64;
        Ok(chunk)
    }

    /// Everything from the current position to the end.
    pub fn read_rest(&mut self) -> VfsResult<Vec<u8>> {
        self.read_chunk(usize::MAX)
    }
}

impl<F: Deref<Target = KvFs>> Read for HandleReader<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = self.read_chunk(buf.len())?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

impl FileHandle {
    /// Sequential reader over this file.
    pub fn reader<'a>(&self, fs: &'a KvFs) -> HandleReader<&'a KvFs> {
        HandleReader::new(fs, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kvfs_store::MemoryStore;

    use super::*;

    #[test]
    fn test_read_to_end() {
        let fs = KvFs::new(Arc::new(MemoryStore::new()));
        let handle = fs.create("a.txt").unwrap();
        fs.write(&handle, 0, b"hello, reader").unwrap();

        let mut reader = handle.reader(&fs);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello, reader");
        assert_eq!(reader.position(), 13);
    }

    #[test]
    fn test_small_buffer() {
        let fs = KvFs::new(Arc::new(MemoryStore::new()));
        let handle = fs.create("a.txt").unwrap();
        fs.write(&handle, 0, b"abcde").unwrap();

        let mut reader = handle.reader(&fs);
        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'e');
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_owned_reader_read_rest() {
        let fs = Arc::new(KvFs::new(Arc::new(MemoryStore::new())));
        let handle = fs.create("a.txt").unwrap();
        fs.write(&handle, 0, b"abcdef").unwrap();

        let mut reader = HandleReader::new(Arc::clone(&fs), handle);
        assert_eq!(reader.read_chunk(2).unwrap(), b"ab");
        assert_eq!(reader.read_rest().unwrap(), b"cdef");
        assert_eq!(reader.position(), 6);
        assert!(reader.read_rest().unwrap().is_empty());
    }

    #[test]
    fn test_deleted_file_is_io_not_found() {
        let fs = KvFs::new(Arc::new(MemoryStore::new()));
        let handle = fs.create("a.txt").unwrap();
        fs.unlink("a.txt").unwrap();

        let mut buf = [0u8; 4];
        let err = handle.reader(&fs).read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
