//! Async Facade
//!
//! Every cache operation blocks on disk or network I/O. [`AsyncCache`] moves
//! each call onto tokio's blocking pool so it can be awaited from async code
//! without stalling the runtime's worker threads.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::Backend;
use super::facade::Cache;
use super::stats::CacheStats;
use crate::error::{Error, Result};

/// Cloneable async handle to a [`Cache`]
pub struct AsyncCache<B: Backend + 'static> {
    inner: Arc<Cache<B>>,
}

impl<B: Backend + 'static> Clone for AsyncCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend + 'static> AsyncCache<B> {
    /// Wrap an existing cache
    pub fn new(cache: Cache<B>) -> Self {
        Self {
            inner: Arc::new(cache),
        }
    }

    /// Share a cache that is also used synchronously elsewhere
    pub fn from_shared(cache: Arc<Cache<B>>) -> Self {
        Self { inner: cache }
    }

    /// Get reference to the wrapped cache
    pub fn blocking(&self) -> &Cache<B> {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Cache<B>) -> Result<T> + Send + 'static,
    {
        let cache = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&cache))
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?
    }

    /// See [`Cache::get_raw`]
    pub async fn get_raw(&self, id: impl Into<String>) -> Result<Option<Bytes>> {
        let id = id.into();
        self.run(move |cache| cache.get_raw(&id)).await
    }

    /// See [`Cache::get`]
    pub async fn get<T>(&self, id: impl Into<String>) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let id = id.into();
        self.run(move |cache| cache.get::<T>(&id)).await
    }

    /// See [`Cache::has`]
    pub async fn has(&self, id: impl Into<String>) -> Result<bool> {
        let id = id.into();
        self.run(move |cache| cache.has(&id)).await
    }

    /// See [`Cache::set_raw`]
    pub async fn set_raw(
        &self,
        id: impl Into<String>,
        payload: impl Into<Bytes>,
        ttl: u64,
    ) -> Result<()> {
        let id = id.into();
        let payload = payload.into();
        self.run(move |cache| cache.set_raw(&id, payload, ttl)).await
    }

    /// See [`Cache::set`]; the value is serialized before leaving the caller
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        id: impl Into<String>,
        value: &T,
        ttl: u64,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.set_raw(id, payload, ttl).await
    }

    /// See [`Cache::delete`]
    pub async fn delete(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.run(move |cache| cache.delete(&id)).await
    }

    /// See [`Cache::get_multi_raw`]
    pub async fn get_multi_raw(&self, ids: Vec<String>) -> Result<HashMap<String, Bytes>> {
        self.run(move |cache| cache.get_multi_raw(&ids[..])).await
    }

    /// See [`Cache::get_multi`]
    pub async fn get_multi<T>(&self, ids: Vec<String>) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.run(move |cache| cache.get_multi::<T, String>(&ids[..])).await
    }

    /// See [`Cache::set_multi_raw`]
    pub async fn set_multi_raw(&self, items: Vec<(String, Bytes)>, ttl: u64) -> Result<()> {
        self.run(move |cache| cache.set_multi_raw(items, ttl)).await
    }

    /// See [`Cache::clear`]
    pub async fn clear(&self) -> Result<()> {
        self.run(|cache| cache.clear()).await
    }

    /// See [`Cache::flush`]
    pub async fn flush(&self) -> Result<()> {
        self.run(|cache| cache.flush()).await
    }

    /// See [`Cache::stats`]
    pub async fn stats(&self) -> Result<Option<CacheStats>> {
        self.run(|cache| cache.stats()).await
    }
}

// =============================================================================
// Tests
// =============================================================================
