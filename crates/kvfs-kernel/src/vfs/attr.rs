//! Attribute codec.
//!
//! A file value is `header || content`. The header has a fixed width per
//! codec version, so content always starts at a known offset and is never
//! located by scanning the value.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// File type bit mask.
pub const S_IFMT: u32 = 0o170000;
/// Regular file.
pub const S_IFREG: u32 = 0o100000;
/// Directory.
pub const S_IFDIR: u32 = 0o040000;

/// Default permission bits for files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default permission bits for directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;
/// Default cap on file content, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 256 << 20;

/// Per-entry metadata stored in the header.
///
/// Timestamps are Unix seconds; `0` means unknown, not the epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Content length in bytes.
    pub size: u64,
    /// Creation time.
    pub created_at: u64,
    /// Last modification time.
    pub modified_at: u64,
    /// Type and permission bits.
    pub mode: u32,
}

impl Attributes {
    /// Attributes for a fresh, empty file created now.
    pub fn new_file(perm: u32) -> Self {
        let now = unix_now();
        Self {
            size: 0,
            created_at: now,
            modified_at: now,
            mode: S_IFREG | (perm & !S_IFMT),
        }
    }

    /// Creation time, if known.
    pub fn created(&self) -> Option<SystemTime> {
        to_system_time(self.created_at)
    }

    /// Modification time, if known.
    pub fn modified(&self) -> Option<SystemTime> {
        to_system_time(self.modified_at)
    }

    /// Whether the mode carries the directory type bits.
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Permission bits without the type.
    pub fn perm(&self) -> u32 {
        self.mode & !S_IFMT
    }
}

/// Current time as Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn to_system_time(secs: u64) -> Option<SystemTime> {
    if secs == 0 {
        None
    } else {
        UNIX_EPOCH.checked_add(Duration::from_secs(secs))
    }
}

/// Encodes attributes into a fixed-width header and locates content behind it.
pub trait AttributeCodec: Send + Sync {
    /// Header format version.
    fn version(&self) -> u8;

    /// Header width in bytes; content begins here.
    fn header_len(&self) -> usize;

    /// Encode attributes into exactly `header_len()` bytes.
    fn encode(&self, attrs: &Attributes) -> Vec<u8>;

    /// Decode a header. Short or foreign input yields `Attributes::default()`.
    fn decode(&self, bytes: &[u8]) -> Attributes;

    /// Split a stored value into its attributes and content.
    fn split_value<'v>(&self, value: &'v [u8]) -> (Attributes, &'v [u8]) {
        let offset = self.header_len().min(value.len());
        (self.decode(value), &value[offset..])
    }

    /// Build a stored value from attributes and content.
    fn join_value(&self, attrs: &Attributes, content: &[u8]) -> Vec<u8> {
        let mut value = self.encode(attrs);
        value.extend_from_slice(content);
        value
    }
}

/// Version 1 header layout (big-endian):
///
/// | offset | width | field       |
/// |--------|-------|-------------|
/// | 0      | 2     | magic `KF`  |
/// | 2      | 1     | version `1` |
/// | 3      | 1     | reserved    |
/// | 4      | 8     | size        |
/// | 12     | 8     | created_at  |
/// | 20     | 8     | modified_at |
/// | 28     | 4     | mode        |
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderV1;

impl HeaderV1 {
    pub const MAGIC: [u8; 2] = *b"KF";
    pub const VERSION: u8 = 1;
    pub const LEN: usize = 32;
}

impl AttributeCodec for HeaderV1 {
    fn version(&self) -> u8 {
        Self::VERSION
    }

    fn header_len(&self) -> usize {
        Self::LEN
    }

    fn encode(&self, attrs: &Attributes) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.extend_from_slice(&Self::MAGIC);
        buf.push(Self::VERSION);
        buf.push(0);
        buf.extend_from_slice(&attrs.size.to_be_bytes());
        buf.extend_from_slice(&attrs.created_at.to_be_bytes());
        buf.extend_from_slice(&attrs.modified_at.to_be_bytes());
        buf.extend_from_slice(&attrs.mode.to_be_bytes());
        buf
    }

    fn decode(&self, bytes: &[u8]) -> Attributes {
        if bytes.len() < Self::LEN || bytes[0..2] != Self::MAGIC || bytes[2] != Self::VERSION {
            return Attributes::default();
        }
        Attributes {
            size: be_u64(&bytes[4..12]),
            created_at: be_u64(&bytes[12..20]),
            modified_at: be_u64(&bytes[20..28]),
            mode: be_u32(&bytes[28..32]),
        }
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

fn be_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attributes {
        Attributes {
            size: 5,
            created_at: 1_700_000_000,
            modified_at: 1_700_000_100,
            mode: S_IFREG | 0o644,
        }
    }

    #[test]
    fn test_header_is_fixed_width() {
        let codec = HeaderV1;
        assert_eq!(codec.encode(&sample()).len(), HeaderV1::LEN);
        assert_eq!(codec.encode(&Attributes::default()).len(), HeaderV1::LEN);
        assert_eq!(codec.header_len(), 32);
        assert_eq!(codec.version(), 1);
    }

    #[test]
    fn test_layout() {
        let bytes = HeaderV1.encode(&sample());
        assert_eq!(&bytes[0..2], b"KF");
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[3], 0);
        assert_eq!(&bytes[4..12], &5u64.to_be_bytes());
        assert_eq!(&bytes[28..32], &(S_IFREG | 0o644).to_be_bytes());
        assert_eq!(HeaderV1.decode(&bytes), sample());
    }

    #[test]
    fn test_short_or_foreign_header_decodes_to_zero() {
        let codec = HeaderV1;
        assert_eq!(codec.decode(&[]), Attributes::default());
        assert_eq!(codec.decode(b"KF\x01"), Attributes::default());

        let mut bytes = codec.encode(&sample());
        bytes[0] = b'X';
        assert_eq!(codec.decode(&bytes), Attributes::default());

        let mut bytes = codec.encode(&sample());
        bytes[2] = 9;
        assert_eq!(codec.decode(&bytes), Attributes::default());
    }

    #[test]
    fn test_content_found_by_offset_not_sentinel() {
        let codec = HeaderV1;
        // Content that looks like a header must come back verbatim.
        let mut content = codec.encode(&sample());
        content.extend_from_slice(b"\n\n\0\0KF");
        let value = codec.join_value(&sample(), &content);

        let (attrs, body) = codec.split_value(&value);
        assert_eq!(attrs, sample());
        assert_eq!(body, content.as_slice());
    }

    #[test]
    fn test_split_short_value() {
        let (attrs, body) = HeaderV1.split_value(b"abc");
        assert_eq!(attrs, Attributes::default());
        assert!(body.is_empty());
    }

    #[test]
    fn test_zero_timestamps_are_unknown() {
        let attrs = Attributes::default();
        assert!(attrs.created().is_none());
        assert!(attrs.modified().is_none());
        assert!(sample().modified().is_some());
    }

    #[test]
    fn test_new_file_mode() {
        let attrs = Attributes::new_file(0o600);
        assert_eq!(attrs.mode, S_IFREG | 0o600);
        assert_eq!(attrs.perm(), 0o600);
        assert!(!attrs.is_dir());
        assert!(attrs.created_at > 0);
    }
}
