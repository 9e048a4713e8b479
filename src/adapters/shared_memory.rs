//! Shared Memory Backend
//!
//! Process-wide in-memory store. Clones share the same map, so several
//! facades (different namespaces, different threads) can sit on one store.
//!
//! Entries carry an absolute expiry and are dropped lazily when a lookup
//! finds them expired. Memory accounting counts key plus payload bytes; an
//! optional capacity turns writes that would exceed it into
//! [`Error::CapacityExceeded`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{unix_now, Backend, CacheStats, Entry};
use crate::error::{Error, Result};

/// Shared memory backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMemoryConfig {
    /// Upper bound on stored key + payload bytes; unbounded when unset
    #[serde(default)]
    pub capacity_bytes: Option<u64>,
}

struct Shared {
    entries: DashMap<String, Entry>,
    used_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    started: Instant,
    capacity: Option<u64>,
}

impl Shared {
    fn new(capacity: Option<u64>) -> Self {
        Self {
            entries: DashMap::new(),
            used_bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            started: Instant::now(),
            capacity,
        }
    }
}

/// Accounted size of one stored entry
fn footprint(key: &str, payload: &[u8]) -> u64 {
    (key.len() + payload.len()) as u64
}

/// In-process shared store
#[derive(Clone)]
pub struct SharedMemoryBackend {
    shared: Arc<Shared>,
}

impl Default for SharedMemoryBackend {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared::new(None)),
        }
    }
}

impl SharedMemoryBackend {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from configuration
    pub fn with_config(config: &SharedMemoryConfig) -> Result<Self> {
        if config.capacity_bytes == Some(0) {
            return Err(Error::Config(
                "shared memory capacity must be greater than zero".into(),
            ));
        }
        info!(capacity_bytes = ?config.capacity_bytes, "shared memory cache opened");
        Ok(Self {
            shared: Arc::new(Shared::new(config.capacity_bytes)),
        })
    }

    /// Configured capacity in bytes
    pub fn capacity(&self) -> Option<u64> {
        self.shared.capacity
    }

    /// Number of stored entries, expired ones included until touched
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Check if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// Accounted bytes in use
    pub fn used_bytes(&self) -> u64 {
        self.shared.used_bytes.load(Ordering::Relaxed)
    }

    /// Reserve `bytes` more against the capacity
    fn reserve(&self, bytes: u64) -> Result<()> {
        let Some(capacity) = self.shared.capacity else {
            self.shared.used_bytes.fetch_add(bytes, Ordering::Relaxed);
            return Ok(());
        };

        self.shared
            .used_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|next| *next <= capacity)
            })
            .map(|_| ())
            .map_err(|used| Error::CapacityExceeded {
                needed: bytes,
                available: capacity.saturating_sub(used),
            })
    }

    fn release(&self, bytes: u64) {
        self.shared.used_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Look up a live entry, dropping it if it has expired
    fn lookup(&self, key: &str, now: i64) -> Option<Bytes> {
        match self.shared.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired_at(now) => return Some(entry.payload.clone()),
            Some(_) => {}
        }

        // Expired: remove unless a writer replaced it meanwhile
        if let Some((key, entry)) = self
            .shared
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
        {
            self.release(footprint(&key, &entry.payload));
            debug!(key = %key, "expired entry dropped");
        }
        None
    }

    fn record(&self, hit: bool) {
        let counter = if hit {
            &self.shared.hits
        } else {
            &self.shared.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for SharedMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemoryBackend")
            .field("entries", &self.len())
            .field("used_bytes", &self.used_bytes())
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

impl Backend for SharedMemoryBackend {
    fn name(&self) -> &'static str {
        "shared_memory"
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let value = self.lookup(key, unix_now());
        self.record(value.is_some());
        Ok(value)
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.lookup(key, unix_now()).is_some())
    }

    fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
        let entry = Entry::with_ttl(value, ttl, unix_now());
        let size = footprint(key, &entry.payload);

        // The shard lock is held from size check to insert
        match self.shared.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let old = footprint(key, &occupied.get().payload);
                if size > old {
                    self.reserve(size - old)?;
                } else {
                    self.release(old - size);
                }
                occupied.insert(entry);
            }
            MapEntry::Vacant(vacant) => {
                self.reserve(size)?;
                vacant.insert(entry);
            }
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        if let Some((key, entry)) = self.shared.entries.remove(key) {
            self.release(footprint(&key, &entry.payload));
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.shared.entries.retain(|key, entry| {
            self.release(footprint(key, &entry.payload));
            false
        });
        Ok(())
    }

    fn stats(&self) -> Result<Option<CacheStats>> {
        let used = self.used_bytes();
        Ok(Some(CacheStats {
            hits: Some(self.shared.hits.load(Ordering::Relaxed)),
            misses: Some(self.shared.misses.load(Ordering::Relaxed)),
            uptime: Some(self.shared.started.elapsed().as_secs()),
            memory_usage: Some(used),
            memory_available: self.shared.capacity.map(|cap| cap.saturating_sub(used)),
        }))
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
        let now = unix_now();
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = self.lookup(key, now);
            self.record(value.is_some());
            if let Some(value) = value {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }
}

// =============================================================================
// Tests
// =============================================================================
