//! nscache - Namespaced Key-Value Cache
//!
//! A cache facade over pluggable storage backends. Every entry lives in a
//! namespace, and a whole namespace can be invalidated in O(1) by bumping
//! its version instead of deleting anything.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Cache<B> / AsyncCache<B> (facade)                │
//! │     namespace ──▶ version memo ──▶ "{ns}@{id}@{version}"         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                         Backend (trait)                          │
//! ├──────────────────┬──────────────────┬───────────────────────────┤
//! │  FileBackend<C>  │ SharedMemory     │  RedisBackend<C>          │
//! │  text / literal  │ Backend          │  MemcachedBackend<C>      │
//! └──────────────────┴──────────────────┴───────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use nscache::{Cache, FileCache, FileCacheConfig};
//!
//! # fn main() -> nscache::Result<()> {
//! let backend = FileCache::open_text(&FileCacheConfig::new("/var/cache/app"))?;
//! let cache = Cache::new(backend, "users");
//!
//! cache.set("user:1", &"alice", 3600)?;
//! assert_eq!(cache.get::<String>("user:1")?, Some("alice".to_string()));
//!
//! // Everything in "users" is now unreachable
//! cache.clear()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Facade, backend contract, keys and entries
//! - [`file`] - File system backend with atomic writes
//! - [`adapters`] - Shared memory, Redis and Memcached backends
//! - [`config`] - Configuration-driven backend selection
//! - [`error`] - Error types

pub mod adapters;
pub mod cache;
pub mod config;
pub mod error;
pub mod file;

// Re-export commonly used types
pub use adapters::{
    MemcachedBackend, MemcachedClient, RedisBackend, RedisConnection, SharedMemoryBackend,
    SharedMemoryConfig,
};
pub use cache::{AsyncCache, Backend, Cache, CacheStats, NO_EXPIRY};
pub use config::{open_backend, BackendConfig, CacheConfig};
pub use error::{Error, Result};
pub use file::{FileBackend, FileCache, FileCacheConfig, LiteralFileCache};
