//! Memcached Adapter
//!
//! Maps the backend primitives onto a caller-supplied [`MemcachedClient`].
//!
//! Memcached reads an expiration time up to 30 days as relative seconds and
//! anything larger as an absolute Unix timestamp, so longer ttls are
//! converted before they reach the client. The protocol has no existence
//! command; `has` is a `get` whose reply distinguishes a stored value from a
//! miss.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::{unix_now, Backend, CacheStats, NO_EXPIRY};
use crate::error::{Error, Result};

/// Longest ttl memcached accepts as relative seconds (30 days)
pub const MAX_RELATIVE_TTL: u64 = 2_592_000;

/// Memcached commands used by [`MemcachedBackend`]
///
/// `exptime` is passed through unchanged, already in memcached's
/// relative-or-absolute convention.
pub trait MemcachedClient: Send + Sync {
    /// `get key`
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// `set key flags exptime bytes`
    fn set(&self, key: &str, value: &[u8], exptime: u32) -> Result<()>;

    /// `delete key`; `Ok(false)` when the key was not found
    fn delete(&self, key: &str) -> Result<bool>;

    /// Multi-key get, returning only the keys found
    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>>;

    /// Multi-key set, returning the keys that could not be stored
    fn set_multi(&self, entries: &[(String, Bytes)], exptime: u32) -> Result<Vec<String>>;

    /// `flush_all`
    fn flush(&self) -> Result<()>;

    /// `stats` of the first configured server
    fn stats(&self) -> Result<HashMap<String, String>>;
}

/// Convert a ttl in seconds into a memcached expiration time
pub fn expiration_time(ttl: u64, now: i64) -> u32 {
    if ttl == NO_EXPIRY {
        return 0;
    }
    if ttl <= MAX_RELATIVE_TTL {
        return ttl as u32;
    }

    let absolute = u64::try_from(now).unwrap_or(0).saturating_add(ttl);
    u32::try_from(absolute).unwrap_or(u32::MAX)
}

fn stat_u64(stats: &HashMap<String, String>, field: &str) -> Option<u64> {
    stats.get(field).and_then(|value| value.trim().parse().ok())
}

/// Backend over a memcached client
#[derive(Debug)]
pub struct MemcachedBackend<C: MemcachedClient> {
    client: C,
}

impl<C: MemcachedClient> MemcachedBackend<C> {
    /// Wrap a client
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: MemcachedClient> Backend for MemcachedBackend<C> {
    fn name(&self) -> &'static str {
        "memcached"
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.client.get(key)
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.client.get(key)?.is_some())
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        self.client.set(key, &value, expiration_time(ttl, unix_now()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let found = self.client.delete(key)?;
        debug!(key, found, "memcached delete");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.client.flush()
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        let stats = self.client.stats()?;
        let used = stat_u64(&stats, "bytes");
        let memory_available = match (stat_u64(&stats, "limit_maxbytes"), used) {
            (Some(limit), Some(used)) => Some(limit.saturating_sub(used)),
            (Some(limit), None) => Some(limit),
            _ => None,
        };

        Ok(Some(CacheStats {
            hits: stat_u64(&stats, "get_hits"),
            misses: stat_u64(&stats, "get_misses"),
            uptime: stat_u64(&stats, "uptime"),
            memory_usage: used,
            memory_available,
        }))
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        self.client.get_multi(keys)
    }

    fn set_multi(&self, entries: &[(String, Bytes)], ttl: u64) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let failed = self
            .client
            .set_multi(entries, expiration_time(ttl, unix_now()))?;
        if failed.is_empty() {
            return Ok(());
        }

        warn!(failed = failed.len(), attempted = entries.len(), "memcached multi-set incomplete");
        Err(Error::PartialBatch {
            failed,
            attempted: entries.len(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
