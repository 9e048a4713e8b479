//! nscache Integration Tests
//!
//! Exercises the public API end to end:
//! - Cache contract over every backend (file, literal file, shared memory,
//!   Redis and Memcached through in-memory clients)
//! - Crash safety of the file store
//! - Configuration-driven backend selection
//! - Async facade

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use nscache::cache::{physical_key, version_key, Backend};
use nscache::{Cache, Error, Result};

// =============================================================================
// In-memory clients for the remote adapters
// =============================================================================

mod fakes {
    use super::*;
    use nscache::{MemcachedClient, RedisConnection};

    /// Redis stand-in; ttls are recorded but never enforced
    #[derive(Clone, Default)]
    pub struct FakeRedis {
        pub data: Arc<Mutex<HashMap<String, Bytes>>>,
    }

    impl RedisConnection for FakeRedis {
        fn get(&self, key: &str) -> Result<Option<Bytes>> {
            Ok(self.data.lock().get(key).cloned())
        }

        fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            self.data
                .lock()
                .insert(key.to_string(), Bytes::copy_from_slice(value));
            Ok(())
        }

        fn set_ex(&self, key: &str, value: &[u8], _seconds: u64) -> Result<()> {
            self.set(key, value)
        }

        fn mget(&self, keys: &[String]) -> Result<Vec<Option<Bytes>>> {
            let data = self.data.lock();
            Ok(keys.iter().map(|key| data.get(key).cloned()).collect())
        }

        fn mset(&self, entries: &[(String, Bytes)]) -> Result<()> {
            let mut data = self.data.lock();
            for (key, value) in entries {
                data.insert(key.clone(), value.clone());
            }
            Ok(())
        }

        fn exists(&self, key: &str) -> Result<bool> {
            Ok(self.data.lock().contains_key(key))
        }

        fn del(&self, key: &str) -> Result<u64> {
            Ok(u64::from(self.data.lock().remove(key).is_some()))
        }

        fn flush_db(&self) -> Result<()> {
            self.data.lock().clear();
            Ok(())
        }

        fn info(&self) -> Result<HashMap<String, String>> {
            Ok(nscache::adapters::parse_info(
                "keyspace_hits:1\r\nkeyspace_misses:2\r\nuptime_in_seconds:3\r\nused_memory:4\r\nmaxmemory:0\r\n",
            ))
        }
    }

    /// Memcached stand-in; exptimes are recorded but never enforced
    #[derive(Clone, Default)]
    pub struct FakeMemcached {
        pub data: Arc<Mutex<HashMap<String, (Bytes, u32)>>>,
    }

    impl MemcachedClient for FakeMemcached {
        fn get(&self, key: &str) -> Result<Option<Bytes>> {
            Ok(self.data.lock().get(key).map(|(value, _)| value.clone()))
        }

        fn set(&self, key: &str, value: &[u8], exptime: u32) -> Result<()> {
            self.data
                .lock()
                .insert(key.to_string(), (Bytes::copy_from_slice(value), exptime));
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<bool> {
            Ok(self.data.lock().remove(key).is_some())
        }

        fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>> {
            let data = self.data.lock();
            Ok(keys
                .iter()
                .filter_map(|key| data.get(key).map(|(value, _)| (key.clone(), value.clone())))
                .collect())
        }

        fn set_multi(&self, entries: &[(String, Bytes)], exptime: u32) -> Result<Vec<String>> {
            let mut data = self.data.lock();
            for (key, value) in entries {
                data.insert(key.clone(), (value.clone(), exptime));
            }
            Ok(Vec::new())
        }

        fn flush(&self) -> Result<()> {
            self.data.lock().clear();
            Ok(())
        }

        fn stats(&self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }
}

// =============================================================================
// Cache contract, run against every backend
// =============================================================================

mod contract_tests {
    use super::fakes::{FakeMemcached, FakeRedis};
    use super::*;
    use nscache::file::{FileCacheConfig, MAX_DIRECTORY_LEVEL};
    use nscache::{FileCache, LiteralFileCache, MemcachedBackend, RedisBackend, SharedMemoryBackend};
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
        score: Option<f64>,
    }

    /// Opens two independent caches over the same underlying store
    fn check_contract<B: Backend>(open: impl Fn(&str) -> Cache<B>) {
        let cache = open("app");
        cache.flush().unwrap();

        // Round trip, no expiry
        let profile = Profile {
            name: "alice".into(),
            tags: vec!["admin".into(), "ops".into()],
            score: Some(9.5),
        };
        cache.set("profile", &profile, 0).unwrap();
        assert_eq!(cache.get::<Profile>("profile").unwrap(), Some(profile.clone()));
        assert!(cache.has("profile").unwrap());

        // Stored null is a hit, not a miss
        cache.set("nothing", &(), 0).unwrap();
        assert_eq!(cache.get::<Option<u8>>("nothing").unwrap(), Some(None));
        assert_eq!(cache.get::<Option<u8>>("never-set").unwrap(), None);

        // Overwrite
        cache.set("counter", &1u32, 0).unwrap();
        cache.set("counter", &2u32, 0).unwrap();
        assert_eq!(cache.get::<u32>("counter").unwrap(), Some(2));

        // Namespace isolation
        let other = open("other");
        assert_eq!(other.get::<Profile>("profile").unwrap(), None);
        other.set("profile", &"someone else", 0).unwrap();
        assert_eq!(cache.get::<Profile>("profile").unwrap(), Some(profile.clone()));

        // Invalidation
        cache.set("a", &1u32, 0).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.get::<u32>("a").unwrap(), None);
        assert!(!cache.has("profile").unwrap());
        cache.set("a", &2u32, 0).unwrap();
        assert_eq!(cache.get::<u32>("a").unwrap(), Some(2));
        assert_eq!(other.get::<String>("profile").unwrap(), Some("someone else".into()));

        // A fresh instance picks up the persisted version
        let reopened = open("app");
        assert_eq!(reopened.namespace_version().unwrap(), 2);
        assert_eq!(reopened.get::<u32>("a").unwrap(), Some(2));

        // Bulk subset contract
        cache
            .set_multi([("a", 1u32), ("b", 2u32)], 0)
            .unwrap();
        let found = cache.get_multi::<u32, _>(&["a", "b", "c"]).unwrap();
        assert_eq!(found, HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));

        // Idempotent delete
        cache.delete("never-existed").unwrap();
        cache.delete("a").unwrap();
        cache.delete("a").unwrap();
        assert!(!cache.has("a").unwrap());

        // Flush wipes every namespace
        cache.flush().unwrap();
        assert!(!other.has("profile").unwrap());
        assert!(!cache.has("b").unwrap());
    }

    fn file_config(dir: &TempDir) -> FileCacheConfig {
        FileCacheConfig::new(dir.path())
            .with_directory_level(2)
            .with_sync_writes(false)
    }

    #[test]
    fn test_file_backend_contract() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        check_contract(|ns| Cache::new(FileCache::open_text(&config).unwrap(), ns));
    }

    #[test]
    fn test_deepest_file_layout_contract() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir).with_directory_level(MAX_DIRECTORY_LEVEL);
        check_contract(|ns| Cache::new(FileCache::open_text(&config).unwrap(), ns));
    }

    #[test]
    fn test_literal_file_backend_contract() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        check_contract(|ns| Cache::new(LiteralFileCache::open_literal(&config).unwrap(), ns));
    }

    #[test]
    fn test_shared_memory_contract() {
        let store = SharedMemoryBackend::new();
        check_contract(|ns| Cache::new(store.clone(), ns));
    }

    #[test]
    fn test_redis_contract() {
        let client = FakeRedis::default();
        check_contract(|ns| Cache::new(RedisBackend::new(client.clone()), ns));
    }

    #[test]
    fn test_memcached_contract() {
        let client = FakeMemcached::default();
        check_contract(|ns| Cache::new(MemcachedBackend::new(client.clone()), ns));
    }

    #[test]
    fn test_boxed_backends_share_one_code_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        let backends: Vec<Box<dyn Backend>> = vec![
            Box::new(FileCache::open_text(&config).unwrap()),
            Box::new(SharedMemoryBackend::new()),
        ];

        for backend in backends {
            let name = backend.name();
            let cache = Cache::new(backend, "boxed");
            cache.set("k", &name, 0).unwrap();
            assert_eq!(cache.get::<String>("k").unwrap().as_deref(), Some(name));
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let file = Cache::new(FileCache::open_text(&file_config(&dir)).unwrap(), "ttl");
        let shared = Cache::new(SharedMemoryBackend::new(), "ttl");

        file.set("short", &"v", 1).unwrap();
        shared.set("short", &"v", 1).unwrap();
        file.set("forever", &"v", 0).unwrap();
        assert!(file.has("short").unwrap());
        assert!(shared.has("short").unwrap());

        std::thread::sleep(Duration::from_millis(2_100));

        assert_eq!(file.get::<String>("short").unwrap(), None);
        assert!(!file.has("short").unwrap());
        assert_eq!(shared.get::<String>("short").unwrap(), None);
        assert!(!shared.has("short").unwrap());
        assert!(file.has("forever").unwrap());
    }

    #[test]
    fn test_physical_keys_reach_the_backend() {
        let store = SharedMemoryBackend::new();
        let cache = Cache::new(store.clone(), "shop");
        cache.set_raw("cart", Bytes::from_static(b"[]"), 0).unwrap();
        cache.clear().unwrap();

        assert!(store.has(&physical_key("shop", "cart", 1)).unwrap());
        assert_eq!(
            store.get(&version_key("shop")).unwrap(),
            Some(Bytes::from_static(b"2"))
        );
    }

    #[test]
    fn test_stats_shape_per_backend() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileCache::open_text(&file_config(&dir)).unwrap();
        let stats = file.stats().unwrap().unwrap();
        assert!(stats.hits.is_none() && stats.misses.is_none() && stats.uptime.is_none());
        assert_eq!(stats.memory_usage, Some(0));

        let redis = RedisBackend::new(FakeRedis::default());
        let stats = redis.stats().unwrap().unwrap();
        assert_eq!(stats.hits, Some(1));
        assert_eq!(stats.memory_available, None);

        let memcached = MemcachedBackend::new(FakeMemcached::default());
        let stats = memcached.stats().unwrap().unwrap();
        assert_eq!(stats, nscache::CacheStats::default());
    }
}

// =============================================================================
// File store crash safety
// =============================================================================

mod file_store_tests {
    use super::*;
    use nscache::cache::{unix_now, Entry};
    use nscache::file::{is_swap_file, walk, FileCacheConfig};
    use nscache::FileCache;
    use std::fs;

    fn open(dir: &std::path::Path) -> FileCache {
        FileCache::open_text(&FileCacheConfig::new(dir).with_directory_level(1)).unwrap()
    }

    #[test]
    fn test_interrupted_write_leaves_original_intact() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let cache = Cache::new(&backend, "app");
        cache.set("doc", &"original", 0).unwrap();

        let key = physical_key("app", "doc", 1);
        let path = backend.path_for(&key);
        let before = fs::read(&path).unwrap();

        let staged = backend
            .store()
            .stage(&path, &Entry::new(vec![b'x'; 64 * 1024]))
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(cache.get::<String>("doc").unwrap(), Some("original".into()));

        // Process "dies" between stage and rename
        drop(staged);

        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(cache.get::<String>("doc").unwrap(), Some("original".into()));
        assert_eq!(walk(dir.path()).filter(|r| is_swap_file(&r.path)).count(), 0);
    }

    #[test]
    fn test_committed_stage_replaces_original() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let path = backend.path_for("k");
        backend.set("k", Bytes::from_static(b"old"), 0).unwrap();

        let staged = backend
            .store()
            .stage(&path, &Entry::new(&b"new"[..]))
            .unwrap();
        staged.commit().unwrap();

        assert_eq!(backend.get("k").unwrap(), Some(Bytes::from_static(b"new")));
    }

    #[test]
    fn test_concurrent_writers_last_rename_wins() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(open(dir.path()));
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 32 * 1024]).collect();

        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let backend = Arc::clone(&backend);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        backend.set("hot", Bytes::from(payload.clone()), 0).unwrap();
                        // Readers never see a torn file
                        let seen = backend.get("hot").unwrap().unwrap();
                        assert!(seen.iter().all(|b| *b == seen[0]));
                        assert_eq!(seen.len(), 32 * 1024);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let last = backend.get("hot").unwrap().unwrap();
        assert!(payloads.iter().any(|p| p[..] == last[..]));
        assert_eq!(walk(dir.path()).filter(|r| is_swap_file(&r.path)).count(), 0);
    }

    #[test]
    fn test_clear_orphans_files_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let cache = Cache::new(&backend, "app");
        for i in 0..5 {
            cache.set(&format!("k{i}"), &i, 0).unwrap();
        }

        cache.clear().unwrap();
        // Old entries are unreachable but still on disk, plus the version record
        assert_eq!(backend.store().file_count(), 6);

        cache.flush().unwrap();
        assert_eq!(backend.store().file_count(), 0);
        assert_eq!(cache.namespace_version().unwrap(), 1);
    }

    #[test]
    fn test_expired_file_written_in_the_past() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let cache = Cache::new(&backend, "app");
        cache.set("k", &"v", 0).unwrap();

        let path = backend.path_for(&physical_key("app", "k", 1));
        fs::write(&path, format!("{}\n\"v\"", unix_now() - 1)).unwrap();

        assert!(!cache.has("k").unwrap());
        assert_eq!(cache.get::<String>("k").unwrap(), None);
    }

    #[test]
    fn test_unwritable_root_rejected() {
        let result = FileCache::open_text(&FileCacheConfig::new("/proc/nscache-test"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

// =============================================================================
// Configuration and async facade
// =============================================================================

mod config_tests {
    use super::*;
    use nscache::{AsyncCache, CacheConfig};

    #[test]
    fn test_yaml_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "namespace: reports\nbackend:\n  kind: literal_file\n  directory: {}\n  directory_level: 1\n  sync_writes: false\n",
            dir.path().display()
        );
        let path = dir.path().join("cache.yaml");
        std::fs::write(&path, yaml).unwrap();

        let config = CacheConfig::from_yaml_file(&path).unwrap();
        let cache = Cache::from_config(&config).unwrap();
        assert_eq!(cache.namespace(), "reports");

        cache.set("q1", &serde_json::json!({"total": 3}), 0).unwrap();
        assert_eq!(
            cache.get::<serde_json::Value>("q1").unwrap(),
            Some(serde_json::json!({"total": 3}))
        );

        // The literal format cannot hold arbitrary bytes
        let result = cache.set_raw("bin", Bytes::from_static(&[0xde, 0xad]), 0);
        assert!(matches!(result, Err(Error::UnsupportedPayload(_))));
    }

    #[tokio::test]
    async fn test_async_cache_over_configured_backend() {
        let config = CacheConfig::from_yaml_str("namespace: jobs\nbackend:\n  kind: shared_memory\n")
            .unwrap();
        let cache = AsyncCache::new(Cache::from_config(&config).unwrap());

        let tasks: Vec<_> = (0..16u32)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.set(format!("job-{i}"), &i, 0).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let ids: Vec<String> = (0..20).map(|i| format!("job-{i}")).collect();
        let found = cache.get_multi::<u32>(ids).await.unwrap();
        assert_eq!(found.len(), 16);
        assert_eq!(found["job-7"], 7);

        cache.clear().await.unwrap();
        assert!(!cache.has("job-7").await.unwrap());
    }
}
