//! Redis Adapter
//!
//! Maps the backend primitives onto Redis commands issued through a
//! caller-supplied [`RedisConnection`]. Connection handling, pooling and the
//! wire protocol stay with the client; this module only decides which
//! command to send and how to read the reply.
//!
//! | Primitive   | Command                               |
//! |-------------|---------------------------------------|
//! | `get`       | `GET`                                 |
//! | `has`       | `EXISTS`                              |
//! | `set`       | `SET`, or `SETEX` when ttl > 0        |
//! | `delete`    | `DEL` (any reply count is success)    |
//! | `flush`     | `FLUSHDB`                             |
//! | `stats`     | `INFO`                                |
//! | `get_multi` | `MGET`                                |
//! | `set_multi` | `MSET`, or one `SETEX` per key        |

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::{Backend, CacheStats, NO_EXPIRY};
use crate::error::{Error, Result};

/// Redis commands used by [`RedisBackend`]
///
/// Implementations wrap a real client and convert its failures with
/// [`Error::backend`].
pub trait RedisConnection: Send + Sync {
    /// `GET key`
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// `SET key value`
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// `SETEX key seconds value`
    fn set_ex(&self, key: &str, value: &[u8], seconds: u64) -> Result<()>;

    /// `MGET key [key ...]`, one reply slot per requested key
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Bytes>>>;

    /// `MSET key value [key value ...]`
    fn mset(&self, entries: &[(String, Bytes)]) -> Result<()>;

    /// `EXISTS key`
    fn exists(&self, key: &str) -> Result<bool>;

    /// `DEL key`, returning the number of removed keys
    fn del(&self, key: &str) -> Result<u64>;

    /// `FLUSHDB`
    fn flush_db(&self) -> Result<()>;

    /// `INFO`, as field name to value
    fn info(&self) -> Result<HashMap<String, String>>;
}

/// Parse the text body of an `INFO` reply into fields
///
/// Section headers (`# Memory`) and blank lines are skipped.
pub fn parse_info(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn info_u64(info: &HashMap<String, String>, field: &str) -> Option<u64> {
    info.get(field).and_then(|value| value.trim().parse().ok())
}

/// Backend over a Redis connection
#[derive(Debug)]
pub struct RedisBackend<C: RedisConnection> {
    client: C,
}

impl<C: RedisConnection> RedisBackend<C> {
    /// Wrap a connection
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Underlying connection
    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: RedisConnection> Backend for RedisBackend<C> {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.client.get(key)
    }

    fn has(&self, key: &str) -> Result<bool> {
        self.client.exists(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        if ttl == NO_EXPIRY {
            self.client.set(key, &value)
        } else {
            self.client.set_ex(key, &value, ttl)
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let removed = self.client.del(key)?;
        debug!(key, removed, "redis delete");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.client.flush_db()
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        let info = self.client.info()?;
        let used = info_u64(&info, "used_memory");
        let memory_available = match (info_u64(&info, "maxmemory"), used) {
            (Some(max), Some(used)) if max > 0 => Some(max.saturating_sub(used)),
            _ => None,
        };

        Ok(Some(CacheStats {
            hits: info_u64(&info, "keyspace_hits"),
            misses: info_u64(&info, "keyspace_misses"),
            uptime: info_u64(&info, "uptime_in_seconds"),
            memory_usage: used,
            memory_available,
        }))
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let replies = self.client.mget(keys)?;
        if replies.len() != keys.len() {
            return Err(Error::backend(
                "redis",
                format!("MGET returned {} replies for {} keys", replies.len(), keys.len()),
            ));
        }

        Ok(keys
            .iter()
            .zip(replies)
            .filter_map(|(key, value)| value.map(|value| (key.clone(), value)))
            .collect())
    }

    fn set_multi(&self, entries: &[(String, Bytes)], ttl: u64) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        if ttl == NO_EXPIRY {
            return self.client.mset(entries).map_err(|e| {
                warn!(error = %e, entries = entries.len(), "redis MSET failed");
                Error::PartialBatch {
                    failed: entries.iter().map(|(key, _)| key.clone()).collect(),
                    attempted: entries.len(),
                }
            });
        }

        let mut failed = Vec::new();
        for (key, value) in entries {
            if let Err(e) = self.client.set_ex(key, value, ttl) {
                warn!(key = %key, error = %e, "redis SETEX failed");
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
}

// =============================================================================
// Tests
// =============================================================================
