//! Backend Primitive Contract
//!
//! The minimal capability set the [`Cache`](super::Cache) facade needs from a
//! storage backend. Keys arriving here are already physical keys; backends
//! never see namespaces or versions.
//!
//! Bulk operations are provided methods that fall back to [`get_each`] and
//! [`set_each`]. Backends with native multi-key calls override them and must
//! keep the same contract: `get_multi` returns only the keys that are
//! present, `set_multi` writes every entry it can and reports the failures.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use super::stats::CacheStats;
use crate::error::{Error, Result};

/// Storage backend primitives
pub trait Backend: Send + Sync {
    /// Short backend name used in logs and errors
    fn name(&self) -> &'static str;

    /// Fetch a value; `Ok(None)` on miss or logical expiry
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Existence check honoring expiry
    fn has(&self, key: &str) -> Result<bool>;

    /// Store a value; `ttl` in seconds, `0` = never expires
    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()>;

    /// Remove a value; removing an absent key succeeds
    fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry the backend holds
    fn flush(&self) -> Result<()>;

    /// Statistics snapshot, `None` when the backend reports nothing
    fn stats(&self) -> Result<Option<CacheStats>>;

    /// Fetch several values, returning only those present
    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        get_each(self, keys)
    }

    /// Store several values with a shared ttl
    fn set_multi(&self, entries: &[(String, Bytes)], ttl: u64) -> Result<()> {
        set_each(self, entries, ttl)
    }
}

/// Default bulk read: one `get` per key
pub fn get_each<B: Backend + ?Sized>(
    backend: &B,
    keys: &[String],
) -> Result<HashMap<String, Bytes>> {
    let mut found = HashMap::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = backend.get(key)? {
            found.insert(key.clone(), value);
        }
    }
    Ok(found)
}

/// Default bulk write: one `set` per entry, continuing past failures
pub fn set_each<B: Backend + ?Sized>(
    backend: &B,
    entries: &[(String, Bytes)],
    ttl: u64,
) -> Result<()> {
    let mut failed = Vec::new();
    for (key, value) in entries {
        if let Err(e) = backend.set(key, value.clone(), ttl) {
            warn!(backend = backend.name(), key = %key, error = %e, "batch write failed");
            failed.push(key.clone());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialBatch {
            failed,
            attempted: entries.len(),
        })
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn has(&self, key: &str) -> Result<bool> {
        (**self).has(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        (**self).stats()
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        (**self).get_multi(keys)
    }

    fn set_multi(&self, entries: &[(String, Bytes)], ttl: u64) -> Result<()> {
        (**self).set_multi(entries, ttl)
    }
}

impl<B: Backend + ?Sized> Backend for &B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn has(&self, key: &str) -> Result<bool> {
        (**self).has(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        (**self).stats()
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        (**self).get_multi(keys)
    }

    fn set_multi(&self, entries: &[(String, Bytes)], ttl: u64) -> Result<()> {
        (**self).set_multi(entries, ttl)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn has(&self, key: &str) -> Result<bool> {
        (**self).has(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        (**self).stats()
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        (**self).get_multi(keys)
    }

    fn set_multi(&self, entries: &[(String, Bytes)], ttl: u64) -> Result<()> {
        (**self).set_multi(entries, ttl)
    }
}

// =============================================================================
// Tests
// =============================================================================
