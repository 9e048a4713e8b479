//! File Backend
//!
//! [`Backend`] over a directory of one-file-per-entry records. The record
//! format is pluggable through [`EntryCodec`]; [`FileCache`] stores the
//! text-framed format and [`LiteralFileCache`] the literal document format.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::codec::{EntryCodec, LiteralCodec, TextCodec};
use super::layout::{ShardLayout, MAX_DIRECTORY_LEVEL};
use super::store::{is_writable, AtomicFileStore, Permissions, SWAP_SUFFIX};
use crate::cache::{unix_now, Backend, CacheStats, Entry};
use crate::error::{Error, Result};

/// File backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCacheConfig {
    /// Cache root; created if missing
    pub directory: PathBuf,

    /// Number of nested shard directories (0 - 16)
    #[serde(default)]
    pub directory_level: usize,

    /// Entry file extension including the dot; the codec's default if unset
    #[serde(default)]
    pub extension: Option<String>,

    /// Permission mask applied to created files and directories
    #[serde(default = "default_umask")]
    pub umask: u32,

    /// fsync staged files before renaming them into place
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

fn default_umask() -> u32 {
    0o002
}

fn default_sync_writes() -> bool {
    true
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("nscache"),
            directory_level: 0,
            extension: None,
            umask: default_umask(),
            sync_writes: default_sync_writes(),
        }
    }
}

impl FileCacheConfig {
    /// Configuration rooted at `directory` with defaults elsewhere
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Set the shard depth
    pub fn with_directory_level(mut self, level: usize) -> Self {
        self.directory_level = level;
        self
    }

    /// Set the entry file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Set the umask
    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    /// Enable or disable fsync before rename
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

fn validate_extension(extension: &str) -> Result<()> {
    if extension.is_empty() {
        return Err(Error::Config("file extension must not be empty".into()));
    }
    if extension.contains(['/', '\\']) {
        return Err(Error::Config(format!(
            "file extension {extension:?} must not contain path separators"
        )));
    }
    if !extension.starts_with('.') {
        return Err(Error::Config(format!(
            "file extension {extension:?} must start with a dot"
        )));
    }
    if extension.ends_with(SWAP_SUFFIX) {
        return Err(Error::Config(format!(
            "file extension {extension:?} collides with staged writes"
        )));
    }
    Ok(())
}

fn prepare_root(directory: &Path, permissions: &Permissions) -> Result<PathBuf> {
    permissions.create_dir_all(directory).map_err(|e| {
        Error::Config(format!(
            "cache directory {} cannot be created: {e}",
            directory.display()
        ))
    })?;

    if !directory.is_dir() {
        return Err(Error::Config(format!(
            "cache directory {} is not a directory",
            directory.display()
        )));
    }
    if !is_writable(directory) {
        return Err(Error::Config(format!(
            "cache directory {} is not writable",
            directory.display()
        )));
    }

    directory.canonicalize().map_err(|e| {
        Error::Config(format!(
            "cache directory {} cannot be resolved: {e}",
            directory.display()
        ))
    })
}

/// Directory-backed cache store
#[derive(Debug)]
pub struct FileBackend<C: EntryCodec> {
    store: AtomicFileStore<C>,
}

/// File backend using the text-framed record format
pub type FileCache = FileBackend<TextCodec>;

/// File backend using the literal document format
pub type LiteralFileCache = FileBackend<LiteralCodec>;

impl<C: EntryCodec> FileBackend<C> {
    /// Validate the configuration, prepare the root and open the backend
    pub fn open(config: &FileCacheConfig, codec: C) -> Result<Self> {
        let permissions = Permissions::from_umask(config.umask)?;

        if config.directory_level > MAX_DIRECTORY_LEVEL {
            return Err(Error::Config(format!(
                "directory_level {} is out of range (max {MAX_DIRECTORY_LEVEL})",
                config.directory_level
            )));
        }

        let extension = config
            .extension
            .clone()
            .unwrap_or_else(|| codec.default_extension().to_string());
        validate_extension(&extension)?;

        let root = prepare_root(&config.directory, &permissions)?;
        info!(
            root = %root.display(),
            codec = codec.name(),
            directory_level = config.directory_level,
            extension = %extension,
            "file cache opened"
        );

        let layout = ShardLayout::new(root, config.directory_level, extension);
        Ok(Self {
            store: AtomicFileStore::new(layout, codec, permissions, config.sync_writes),
        })
    }

    /// Underlying store
    pub fn store(&self) -> &AtomicFileStore<C> {
        &self.store
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        self.store.layout().root()
    }

    /// File that holds (or would hold) a physical key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.store.path_for(key)
    }
}

impl FileCache {
    /// Open a text-format file cache
    pub fn open_text(config: &FileCacheConfig) -> Result<Self> {
        Self::open(config, TextCodec)
    }
}

impl LiteralFileCache {
    /// Open a literal-format file cache
    pub fn open_literal(config: &FileCacheConfig) -> Result<Self> {
        Self::open(config, LiteralCodec)
    }
}

impl<C: EntryCodec> Backend for FileBackend<C> {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let entry = self.store.read(&self.path_for(key), unix_now())?;
        debug!(key, hit = entry.is_some(), "file get");
        Ok(entry.map(|entry| entry.payload))
    }

    fn has(&self, key: &str) -> Result<bool> {
        self.store.exists(&self.path_for(key), unix_now())
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        let entry = Entry::with_ttl(value, ttl, unix_now());
        self.store.write(&self.path_for(key), &entry)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(&self.path_for(key))
    }

    fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        Ok(Some(CacheStats {
            hits: None,
            misses: None,
            uptime: None,
            memory_usage: Some(self.store.usage()),
            memory_available: self.store.available(),
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================
