//! Namespaced Cache Core
//!
//! The backend-independent half of nscache: key derivation, entry metadata,
//! the backend primitive contract and the facade callers code against.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      Cache<B> / AsyncCache<B>                         │
//! │   get / has / set / delete / get_multi / set_multi / clear / flush    │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  physical_key(ns, id, version)       NamespaceVersion (lazy memo)     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                          Backend (trait)                              │
//! │   FileBackend<C> │ SharedMemoryBackend │ RedisBackend │ Memcached     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

mod backend;
mod entry;
mod facade;
mod key;
mod nonblocking;
mod stats;

pub use backend::{get_each, set_each, Backend};
pub use entry::{unix_now, Entry, Expiry, NO_EXPIRY};
pub use facade::{Cache, NamespaceVersion, INITIAL_VERSION};
pub use key::{physical_key, version_key, KEY_DELIMITER, VERSION_SUFFIX};
pub use nonblocking::AsyncCache;
pub use stats::CacheStats;
