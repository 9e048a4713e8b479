//! Backend Adapters
//!
//! [`Backend`](crate::cache::Backend) implementations for stores other than
//! the local file system.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Cache<B> (facade)                            │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │ Backend
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Adapters (This Module)                         │
//! │  SharedMemoryBackend │ RedisBackend<C> │ MemcachedBackend<C>     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │ client traits
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  in-process map      │ RedisConnection │ MemcachedClient         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The remote adapters never open connections themselves. Callers wrap
//! whatever client they use in [`RedisConnection`] or [`MemcachedClient`]
//! and hand it over.
//!
//! # Usage
//!
//! ```ignore
//! use nscache::adapters::RedisBackend;
//! use nscache::Cache;
//!
//! let cache = Cache::new(RedisBackend::new(my_connection), "sessions");
//! cache.set("user:1", &session, 1800)?;
//! ```

mod memcached;
mod redis;
mod shared_memory;

pub use memcached::{expiration_time, MemcachedBackend, MemcachedClient, MAX_RELATIVE_TTL};
pub use redis::{parse_info, RedisBackend, RedisConnection};
pub use shared_memory::{SharedMemoryBackend, SharedMemoryConfig};
