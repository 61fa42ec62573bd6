//! TTL caching for expensive per-IP lookups.
//!
//! All cached values are deterministically recomputable from their key, so
//! concurrent writes to the same key are idempotent and last-write-wins is
//! acceptable.

use moka::future::Cache;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

/// Named TTL key-value cache backed by moka. Reads never block each other
/// and no lock is held across the compute future.
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    name: &'static str,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, name }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Return the cached value or compute, store, and return it.
    pub async fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: Future<Output = V>,
    {
        self.inner.get_with(key, compute).await
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
