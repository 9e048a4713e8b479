//! Cache Facade
//!
//! Implements the full cache contract on top of a [`Backend`], adding
//! namespacing and O(1) namespace invalidation.
//!
//! # Key flow
//!
//! ```text
//! get("user:1") ──▶ physical_key(ns, "user:1", version) ──▶ backend.get(..)
//!                         ▲
//!                         └── version memo, loaded once from `<ns>@version`
//! ```
//!
//! `clear()` bumps the version instead of deleting anything: entries written
//! under the old version become unreachable and are left for the backend's
//! own eviction (or a full `flush()`) to reclaim.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::backend::Backend;
use super::key::{physical_key, version_key};
use super::stats::CacheStats;
use crate::error::{Error, Result};

/// Version assumed for a namespace that has never been cleared
pub const INITIAL_VERSION: u64 = 1;

/// Lazily loaded, memoized namespace version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamespaceVersion {
    cached: Option<u64>,
}

impl NamespaceVersion {
    /// A memo with nothing loaded yet
    pub fn unknown() -> Self {
        Self { cached: None }
    }

    /// The memoized value, if loaded
    pub fn get(&self) -> Option<u64> {
        self.cached
    }

    /// Record a loaded or advanced value
    pub fn store(&mut self, version: u64) {
        self.cached = Some(version);
    }

    /// Forget the memoized value
    pub fn reset(&mut self) {
        self.cached = None;
    }
}

/// Namespace and its version, always replaced together
#[derive(Debug)]
struct NamespaceState {
    namespace: String,
    version: NamespaceVersion,
}

/// Namespaced cache over a pluggable backend
pub struct Cache<B: Backend> {
    /// Storage backend
    backend: B,
    /// Current namespace and version memo
    state: Mutex<NamespaceState>,
}

impl<B: Backend> Cache<B> {
    /// Create a cache for `namespace` on top of `backend`
    pub fn new(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            state: Mutex::new(NamespaceState {
                namespace: namespace.into(),
                version: NamespaceVersion::unknown(),
            }),
        }
    }

    /// Get reference to the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current namespace
    pub fn namespace(&self) -> String {
        self.state.lock().namespace.clone()
    }

    /// Switch namespace; the version is refetched on next use
    pub fn set_namespace(&self, namespace: impl Into<String>) {
        let mut state = self.state.lock();
        state.namespace = namespace.into();
        state.version.reset();
    }

    /// Current namespace version, loading it from the backend on first use
    pub fn namespace_version(&self) -> Result<u64> {
        let mut state = self.state.lock();
        self.load_version(&mut state)
    }

    fn load_version(&self, state: &mut NamespaceState) -> Result<u64> {
        if let Some(version) = state.version.get() {
            return Ok(version);
        }

        let raw = self.backend.get(&version_key(&state.namespace))?;
        let version = raw
            .as_deref()
            .and_then(|bytes| serde_json::from_slice::<u64>(bytes).ok())
            .filter(|v| *v > 0)
            .unwrap_or(INITIAL_VERSION);

        debug!(namespace = %state.namespace, version, "loaded namespace version");
        state.version.store(version);
        Ok(version)
    }

    fn key_for(&self, id: &str) -> Result<String> {
        let mut state = self.state.lock();
        let version = self.load_version(&mut state)?;
        Ok(physical_key(&state.namespace, id, version))
    }

    /// Map physical keys back to the logical ids they were derived from
    fn keys_for<I, S>(&self, ids: I) -> Result<Vec<(String, String)>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        let version = self.load_version(&mut state)?;
        Ok(ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref();
                (physical_key(&state.namespace, id, version), id.to_string())
            })
            .collect())
    }

    // =========================================================================
    // Single-key operations
    // =========================================================================

    /// Read raw payload bytes
    pub fn get_raw(&self, id: &str) -> Result<Option<Bytes>> {
        let key = self.key_for(id)?;
        self.backend.get(&key)
    }

    /// Read and deserialize a payload
    pub fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.get_raw(id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a live entry exists for `id`
    pub fn has(&self, id: &str) -> Result<bool> {
        let key = self.key_for(id)?;
        self.backend.has(&key)
    }

    /// Store raw payload bytes; `ttl` in seconds, `0` = never expires
    pub fn set_raw(&self, id: &str, payload: impl Into<Bytes>, ttl: u64) -> Result<()> {
        let key = self.key_for(id)?;
        self.backend.set(&key, payload.into(), ttl).inspect_err(|e| {
            warn!(backend = self.backend.name(), id, error = %e, "cache write failed");
        })
    }

    /// Serialize and store a payload
    pub fn set<T: Serialize + ?Sized>(&self, id: &str, value: &T, ttl: u64) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.set_raw(id, payload, ttl)
    }

    /// Remove an entry; removing an absent id succeeds
    pub fn delete(&self, id: &str) -> Result<()> {
        let key = self.key_for(id)?;
        debug!(backend = self.backend.name(), id, "delete");
        self.backend.delete(&key)
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    /// Read raw payloads; only ids that are present appear in the result
    pub fn get_multi_raw<S: AsRef<str>>(&self, ids: &[S]) -> Result<HashMap<String, Bytes>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let pairs = self.keys_for(ids)?;
        let keys: Vec<String> = pairs.iter().map(|(key, _)| key.clone()).collect();
        let mut found = self.backend.get_multi(&keys)?;

        Ok(pairs
            .into_iter()
            .filter_map(|(key, id)| found.remove(&key).map(|value| (id, value)))
            .collect())
    }

    /// Read and deserialize several payloads
    pub fn get_multi<T: DeserializeOwned, S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<HashMap<String, T>> {
        self.get_multi_raw(ids)?
            .into_iter()
            .map(|(id, bytes)| Ok((id, serde_json::from_slice(&bytes)?)))
            .collect()
    }

    /// Store several raw payloads with a shared ttl.
    ///
    /// On partial failure the error lists the failed logical ids; entries
    /// written before or after a failure stay written.
    pub fn set_multi_raw<I, K, V>(&self, items: I, ttl: u64) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Bytes>,
    {
        let (ids, values): (Vec<K>, Vec<V>) = items.into_iter().unzip();
        if ids.is_empty() {
            return Ok(());
        }

        let pairs = self.keys_for(&ids)?;
        let entries: Vec<(String, Bytes)> = pairs
            .iter()
            .zip(values)
            .map(|((key, _), value)| (key.clone(), value.into()))
            .collect();

        self.backend.set_multi(&entries, ttl).map_err(|e| match e {
            Error::PartialBatch { failed, attempted } => {
                let logical: HashMap<&str, &str> = pairs
                    .iter()
                    .map(|(key, id)| (key.as_str(), id.as_str()))
                    .collect();
                let failed = failed
                    .into_iter()
                    .map(|key| match logical.get(key.as_str()) {
                        Some(id) => id.to_string(),
                        None => key,
                    })
                    .collect::<Vec<_>>();
                warn!(
                    backend = self.backend.name(),
                    failed = failed.len(),
                    attempted,
                    "partial batch write"
                );
                Error::PartialBatch { failed, attempted }
            }
            other => other,
        })
    }

    /// Serialize and store several payloads with a shared ttl
    pub fn set_multi<I, K, T>(&self, items: I, ttl: u64) -> Result<()>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Serialize,
    {
        let encoded = items
            .into_iter()
            .map(|(id, value)| Ok((id, serde_json::to_vec(&value)?)))
            .collect::<Result<Vec<_>>>()?;
        self.set_multi_raw(encoded, ttl)
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Invalidate every entry of the current namespace.
    ///
    /// The in-memory version only advances once the new value is persisted,
    /// so the backend never holds a lower version than this instance uses.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        let next = self.load_version(&mut state)? + 1;
        let payload = serde_json::to_vec(&next)?;

        self.backend
            .set(&version_key(&state.namespace), Bytes::from(payload), 0)
            .inspect_err(|e| {
                warn!(namespace = %state.namespace, error = %e, "failed to persist namespace version");
            })?;

        state.version.store(next);
        info!(namespace = %state.namespace, version = next, "namespace cleared");
        Ok(())
    }

    /// Remove every entry in the backend, across all namespaces
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()?;
        // The version record is gone too; reload lazily
        self.state.lock().version.reset();
        info!(backend = self.backend.name(), "backend flushed");
        Ok(())
    }

    /// Backend statistics snapshot
    pub fn stats(&self) -> Result<Option<CacheStats>> {
        self.backend.stats()
    }
}

impl<B: Backend> std::fmt::Debug for Cache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Cache")
            .field("backend", &self.backend.name())
            .field("namespace", &state.namespace)
            .field("version", &state.version.get())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::{unix_now, Expiry};
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Map-backed backend with switchable write failures and call counting
    #[derive(Default)]
    struct TestBackend {
        data: Mutex<HashMap<String, (Bytes, Expiry)>>,
        fail_writes: AtomicBool,
        gets: AtomicUsize,
    }

    impl Backend for TestBackend {
        fn name(&self) -> &'static str {
            "test"
        }

        fn get(&self, key: &str) -> Result<Option<Bytes>> {
            self.gets.fetch_add(1, Ordering::Relaxed);
            let now = unix_now();
            Ok(self
                .data
                .lock()
                .get(key)
                .filter(|(_, expiry)| !expiry.is_expired_at(now))
                .map(|(value, _)| value.clone()))
        }

        fn has(&self, key: &str) -> Result<bool> {
            Ok(self.get(key)?.is_some())
        }

        fn set(&self, key: &str, value: Bytes, ttl: u64) -> Result<()> {
            if self.fail_writes.load(Ordering::Relaxed) || key.contains("reject") {
                return Err(Error::backend("test", "write refused"));
            }
            let expiry = Expiry::from_ttl(ttl, unix_now());
            self.data.lock().insert(key.to_string(), (value, expiry));
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().remove(key);
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            self.data.lock().clear();
            Ok(())
        }

        fn stats(&self) -> Result<Option<CacheStats>> {
            Ok(None)
        }
    }

    fn cache() -> Cache<Arc<TestBackend>> {
        Cache::new(Arc::new(TestBackend::default()), "app")
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = cache();
        cache.set("user", &vec![1, 2, 3], 0).unwrap();
        assert_eq!(cache.get::<Vec<i32>>("user").unwrap(), Some(vec![1, 2, 3]));
        assert!(cache.has("user").unwrap());
    }

    #[test]
    fn test_stored_null_is_not_a_miss() {
        let cache = cache();
        cache.set("nothing", &Option::<u32>::None, 0).unwrap();

        assert_eq!(cache.get::<Option<u32>>("nothing").unwrap(), Some(None));
        assert_eq!(cache.get::<Option<u32>>("absent").unwrap(), None);
    }

    #[test]
    fn test_physical_keys_carry_namespace_and_version() {
        let cache = cache();
        cache.set_raw("a", &b"1"[..], 0).unwrap();
        assert!(cache.backend().data.lock().contains_key("app@a@1"));
    }

    #[test]
    fn test_version_loaded_once() {
        let cache = cache();
        cache.get_raw("a").unwrap();
        cache.get_raw("b").unwrap();
        cache.get_raw("c").unwrap();
        // One version lookup plus three payload lookups
        assert_eq!(cache.backend().gets.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_falsy_version_record_defaults_to_one() {
        let cache = cache();
        cache
            .backend()
            .set("app@version", Bytes::from_static(b"0"), 0)
            .unwrap();
        assert_eq!(cache.namespace_version().unwrap(), 1);

        let garbage = Cache::new(Arc::new(TestBackend::default()), "junk");
        garbage
            .backend()
            .set("junk@version", Bytes::from_static(b"not-a-number"), 0)
            .unwrap();
        assert_eq!(garbage.namespace_version().unwrap(), 1);
    }

    #[test]
    fn test_clear_invalidates_namespace() {
        let cache = cache();
        cache.set("a", &1, 0).unwrap();
        cache.clear().unwrap();

        assert_eq!(cache.get::<i32>("a").unwrap(), None);
        assert_eq!(cache.namespace_version().unwrap(), 2);

        cache.set("a", &2, 0).unwrap();
        assert_eq!(cache.get::<i32>("a").unwrap(), Some(2));

        // The old physical entry is orphaned, not deleted
        assert!(cache.backend().data.lock().contains_key("app@a@1"));
    }

    #[test]
    fn test_clear_persists_version_for_other_instances() {
        let backend = Arc::new(TestBackend::default());
        let first = Cache::new(Arc::clone(&backend), "app");
        first.set("a", &1, 0).unwrap();
        first.clear().unwrap();

        let second = Cache::new(Arc::clone(&backend), "app");
        assert_eq!(second.namespace_version().unwrap(), 2);
        assert_eq!(second.get::<i32>("a").unwrap(), None);
    }

    #[test]
    fn test_failed_clear_keeps_version() {
        let cache = cache();
        cache.set("a", &1, 0).unwrap();
        cache.backend().fail_writes.store(true, Ordering::Relaxed);

        assert!(cache.clear().is_err());
        assert_eq!(cache.namespace_version().unwrap(), 1);
        assert_eq!(cache.get::<i32>("a").unwrap(), Some(1));
    }

    #[test]
    fn test_set_namespace_resets_version() {
        let backend = Arc::new(TestBackend::default());
        let cache = Cache::new(Arc::clone(&backend), "one");
        cache.clear().unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.namespace_version().unwrap(), 3);

        cache.set_namespace("two");
        assert_eq!(cache.namespace(), "two");
        assert_eq!(cache.namespace_version().unwrap(), 1);

        cache.set_namespace("one");
        assert_eq!(cache.namespace_version().unwrap(), 3);
    }

    #[test]
    fn test_namespace_isolation() {
        let backend = Arc::new(TestBackend::default());
        let left = Cache::new(Arc::clone(&backend), "left");
        let right = Cache::new(Arc::clone(&backend), "right");

        left.set("id", &"left-value", 0).unwrap();
        assert_eq!(right.get::<String>("id").unwrap(), None);

        right.set("id", &"right-value", 0).unwrap();
        left.clear().unwrap();
        assert_eq!(left.get::<String>("id").unwrap(), None);
        assert_eq!(right.get::<String>("id").unwrap(), Some("right-value".into()));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = cache();
        cache.delete("never-existed").unwrap();
        cache.set("k", &1, 0).unwrap();
        cache.delete("k").unwrap();
        cache.delete("k").unwrap();
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn test_get_multi_subset() {
        let cache = cache();
        cache.set_multi([("a", 1), ("b", 2)], 0).unwrap();

        let found: HashMap<String, i32> = cache.get_multi(&["a", "b", "c"]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], 1);
        assert_eq!(found["b"], 2);
        assert!(!found.contains_key("c"));
    }

    #[test]
    fn test_get_multi_empty() {
        let cache = cache();
        let ids: [&str; 0] = [];
        assert!(cache.get_multi_raw(&ids).unwrap().is_empty());
        assert_eq!(cache.backend().gets.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_set_multi_reports_logical_ids() {
        let cache = cache();
        let result = cache.set_multi([("ok", 1), ("reject-me", 2), ("also-ok", 3)], 0);

        assert_matches!(result, Err(Error::PartialBatch { ref failed, attempted: 3 }) if failed == &vec!["reject-me".to_string()]);
        assert_eq!(cache.get::<i32>("ok").unwrap(), Some(1));
        assert_eq!(cache.get::<i32>("also-ok").unwrap(), Some(3));
    }

    #[test]
    fn test_flush_resets_everything() {
        let backend = Arc::new(TestBackend::default());
        let a = Cache::new(Arc::clone(&backend), "a");
        let b = Cache::new(Arc::clone(&backend), "b");
        a.set("x", &1, 0).unwrap();
        b.set("x", &2, 0).unwrap();
        a.clear().unwrap();

        a.flush().unwrap();
        assert_eq!(b.get::<i32>("x").unwrap(), None);
        assert_eq!(a.namespace_version().unwrap(), 1);
    }

    #[test]
    fn test_namespace_version_memo() {
        let mut memo = NamespaceVersion::unknown();
        assert_eq!(memo.get(), None);
        memo.store(4);
        assert_eq!(memo.get(), Some(4));
        memo.reset();
        assert_eq!(memo.get(), None);
    }

    #[test]
    fn test_debug_output() {
        let cache = cache();
        let debug = format!("{:?}", cache);
        assert!(debug.contains("Cache"));
        assert!(debug.contains("app"));
    }
}
