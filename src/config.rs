//! Cache Configuration
//!
//! Selects and configures a backend from data, so the store behind a
//! [`Cache`] can be swapped without touching calling code.
//!
//! ```yaml
//! namespace: sessions
//! backend:
//!   kind: file
//!   directory: /var/cache/app
//!   directory_level: 2
//! ```
//!
//! Remote adapters need a live client and are built in code instead.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::{SharedMemoryBackend, SharedMemoryConfig};
use crate::cache::{Backend, Cache};
use crate::error::{Error, Result};
use crate::file::{FileCache, FileCacheConfig, LiteralFileCache};

/// Backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Text-framed file store
    File(FileCacheConfig),
    /// Literal document file store (JSON payloads only)
    LiteralFile(FileCacheConfig),
    /// In-process shared memory store
    SharedMemory(SharedMemoryConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::File(FileCacheConfig::default())
    }
}

/// Top-level cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace the cache starts in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Backing store
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            backend: BackendConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid cache config: {e}")))
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }
}

/// Construct the backend a configuration describes
pub fn open_backend(config: &BackendConfig) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match config {
        BackendConfig::File(file) => Box::new(FileCache::open_text(file)?),
        BackendConfig::LiteralFile(file) => Box::new(LiteralFileCache::open_literal(file)?),
        BackendConfig::SharedMemory(shared) => Box::new(SharedMemoryBackend::with_config(shared)?),
    };
    Ok(backend)
}

impl Cache<Box<dyn Backend>> {
    /// Build a cache from configuration
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = open_backend(&config.backend)?;
        info!(namespace = %config.namespace, backend = backend.name(), "cache configured");
        Ok(Cache::new(backend, config.namespace.clone()))
    }
}
