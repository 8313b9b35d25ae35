//! Configuration for kvfs.
//!
//! Loaded from a TOML file; every field has a default, so an empty file is valid.
//!
//! ```toml
//! [store]
//! backend = "sqlite"
//! data_dir = "./data"
//!
//! [fs]
//! root = ""
//! listing = "dirs-first"
//! file_mode = 0o644
//! dir_mode = 0o755
//! max_file_size = 268435456
//! ```

use std::path::{Path, PathBuf};

use kvfs_store::KvDb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vfs::attr::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_MAX_FILE_SIZE};
use crate::vfs::{KvFsOptions, ListingOrder};

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which store backs the namespaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One SQLite file per database under `data_dir`.
    #[default]
    Sqlite,
    /// Everything in memory, gone on exit.
    Memory,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Where SQLite databases live.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// `[fs]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Key prefix every namespace lives under.
    pub root: String,
    pub listing: ListingOrder,
    pub file_mode: u32,
    pub dir_mode: u32,
    /// Bytes; writes that would grow a file past this fail.
    pub max_file_size: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            listing: ListingOrder::default(),
            file_mode: DEFAULT_FILE_MODE,
            dir_mode: DEFAULT_DIR_MODE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvfsConfig {
    pub store: StoreConfig,
    pub fs: FsConfig,
}

impl KvfsConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Engine options from the `[fs]` section.
    pub fn fs_options(&self) -> KvFsOptions {
        KvFsOptions {
            root: self.fs.root.clone(),
            listing: self.fs.listing,
            file_mode: self.fs.file_mode,
            dir_mode: self.fs.dir_mode,
            max_file_size: self.fs.max_file_size,
        }
    }

    /// Store opener for the `[store]` section.
    pub fn open_db(&self) -> KvDb {
        match self.store.backend {
            StoreBackend::Sqlite => KvDb::sqlite(&self.store.data_dir),
            StoreBackend::Memory => KvDb::memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = KvfsConfig::from_toml_str("").unwrap();
        assert_eq!(config, KvfsConfig::default());
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.fs_options(), KvFsOptions::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[store]
backend = "memory"
data_dir = "/var/lib/kvfs"

[fs]
root = "site"
listing = "lexicographic"
file_mode = 0o600
dir_mode = 0o700
max_file_size = 1048576
"#;
        let config = KvfsConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.data_dir, PathBuf::from("/var/lib/kvfs"));

        let options = config.fs_options();
        assert_eq!(options.root, "site");
        assert_eq!(options.listing, ListingOrder::Lexicographic);
        assert_eq!(options.file_mode, 0o600);
        assert_eq!(options.dir_mode, 0o700);
        assert_eq!(options.max_file_size, 1 << 20);
        assert!(config.open_db().data_dir().is_none());
    }

    #[test]
    fn test_partial_section() {
        let config = KvfsConfig::from_toml_str("[fs]\nlisting = \"dirs-first\"\n").unwrap();
        assert_eq!(config.fs.file_mode, DEFAULT_FILE_MODE);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(
            KvfsConfig::from_toml_str("[fs]\nlisting = \"sideways\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = KvfsConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvfs.toml");
        std::fs::write(&path, "[store]\ndata_dir = \"db\"\n").unwrap();
        let config = KvfsConfig::load(&path).unwrap();
        assert_eq!(config.open_db().data_dir(), Some(Path::new("db")));
    }
}
