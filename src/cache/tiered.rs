// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered Cache Manager
//!
//! Two-level read/write-through cache in front of a [`Fetcher`].
//!
//! # Flow
//!
//! ```text
//! get(collection, key, fetcher)
//!       │
//!       ▼
//! ┌──────────────────┐  hit
//! │  Volatile tier   │─────────────────────────────→ return
//! └──────────────────┘
//!       │ miss
//!       ▼
//! ┌──────────────────┐  hit   promote to volatile
//! │  Durable tier    │─────────────────────────────→ return
//! └──────────────────┘
//!       │ miss (or storage error)
//!       ▼
//! ┌──────────────────┐  Some  write through to both
//! │  fetcher.fetch() │─────────────────────────────→ return
//! └──────────────────┘
//! ```
//!
//! Storage errors never reach the caller of `get`: they are logged and
//! treated as a miss. Concurrent misses for one key are single-flighted
//! unless `coalesce_misses` is off.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::volatile::VolatileTier;
use crate::config::CacheConfig;
use crate::fetcher::Fetcher;
use crate::storage::{Collection, LocalStore, StorageError};

#[derive(Error, Debug)]
pub enum CacheError<E = Infallible> {
    #[error("Fetch failed: {0}")]
    Fetch(#[source] E),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Volatile tier TTL (default from [`CacheConfig::memory_ttl_ms`])
    pub memory_ttl: Option<Duration>,
    /// Durable tier TTL (default from [`CacheConfig::durable_ttl_ms`])
    pub durable_ttl: Option<Duration>,
    /// Bypass the volatile tier for this call
    pub skip_memory: bool,
    /// Bypass the durable tier for this call
    pub skip_durable: bool,
}

impl CacheOptions {
    #[must_use]
    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_durable_ttl(mut self, ttl: Duration) -> Self {
        self.durable_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn memory_only() -> Self {
        Self {
            skip_durable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn durable_only() -> Self {
        Self {
            skip_memory: true,
            ..Self::default()
        }
    }
}

/// Process-lifetime hit/miss counters. Reset only by [`TieredCache::reset_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub l3_hits: u64,
    pub l3_misses: u64,
    pub total_requests: u64,
    /// Incremental mean over every `get`
    pub avg_response_time_ms: f64,
}

impl CacheMetrics {
    /// Fraction of requests answered without calling the fetcher.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.l1_hits + self.l2_hits) as f64 / self.total_requests as f64
    }

    fn record_response(&mut self, ms: f64) {
        self.total_requests += 1;
        self.avg_response_time_ms += (ms - self.avg_response_time_ms) / self.total_requests as f64;
    }
}

#[derive(Clone, Copy)]
enum Tier {
    Memory,
    Durable,
    Fetch,
}

impl Tier {
    fn label(self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Durable => "durable",
            Tier::Fetch => "fetch",
        }
    }
}

type InFlightMap = DashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// One caller's share of a key's miss lock. The map entry goes away with
/// the last share, including when the owning future is dropped mid-fetch.
struct InFlight<'a> {
    map: &'a InFlightMap,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(map: &'a InFlightMap, key: &'a str) -> Self {
        let lock = map.entry(key.to_string()).or_default().clone();
        Self { map, key, lock }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // Release our share before looking for other waiters
        self.lock = Arc::default();
        self.map.remove_if(self.key, |_, l| Arc::strong_count(l) == 1);
    }
}

pub struct TieredCache {
    memory: VolatileTier,
    durable: LocalStore,
    config: CacheConfig,
    /// Per-key locks for in-flight misses
    in_flight: InFlightMap,
    metrics: Mutex<CacheMetrics>,
}

impl TieredCache {
    pub fn new(durable: LocalStore, config: CacheConfig) -> Self {
        Self {
            memory: VolatileTier::new(config.memory_max_entries),
            durable,
            config,
            in_flight: DashMap::new(),
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }

    fn cache_key(collection: Collection, key: &str) -> String {
        format!("{collection}:{key}")
    }

    fn memory_ttl(&self, opts: &CacheOptions) -> Duration {
        opts.memory_ttl.unwrap_or_else(|| self.config.memory_ttl())
    }

    fn durable_ttl(&self, opts: &CacheOptions) -> Duration {
        opts.durable_ttl.unwrap_or_else(|| self.config.durable_ttl())
    }

    fn record(&self, tier: Tier, hit: bool) {
        {
            let mut m = self.metrics.lock();
            let counter = match (tier, hit) {
                (Tier::Memory, true) => &mut m.l1_hits,
                (Tier::Memory, false) => &mut m.l1_misses,
                (Tier::Durable, true) => &mut m.l2_hits,
                (Tier::Durable, false) => &mut m.l2_misses,
                (Tier::Fetch, true) => &mut m.l3_hits,
                (Tier::Fetch, false) => &mut m.l3_misses,
            };
            *counter += 1;
        }
        crate::metrics::record_tier_lookup(tier.label(), if hit { "hit" } else { "miss" });
    }

    /// Read through both tiers, falling back to `fetcher` on a full miss.
    ///
    /// `Ok(None)` when the fetcher has no record; nothing is cached then.
    pub async fn get<F>(
        &self,
        collection: Collection,
        key: &str,
        fetcher: &F,
        opts: &CacheOptions,
    ) -> Result<Option<F::Output>, CacheError<F::Error>>
    where
        F: Fetcher,
        F::Output: Serialize + DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.lookup(collection, key, fetcher, opts).await;

        let elapsed = start.elapsed();
        self.metrics.lock().record_response(elapsed.as_secs_f64() * 1000.0);
        crate::metrics::record_cache_get_latency(collection.as_str(), elapsed);
        result
    }

    async fn lookup<F>(
        &self,
        collection: Collection,
        key: &str,
        fetcher: &F,
        opts: &CacheOptions,
    ) -> Result<Option<F::Output>, CacheError<F::Error>>
    where
        F: Fetcher,
        F::Output: Serialize + DeserializeOwned,
    {
        let cache_key = Self::cache_key(collection, key);

        if let Some(value) = self.from_memory(&cache_key, opts) {
            self.record(Tier::Memory, true);
            return Ok(Some(value));
        }

        if !self.config.coalesce_misses {
            self.record(Tier::Memory, false);
            return self.resolve_miss(collection, key, &cache_key, fetcher, opts).await;
        }

        let flight = InFlight::join(&self.in_flight, &cache_key);
        let _guard = flight.lock().await;
        // Another caller may have filled the key while we waited
        if let Some(value) = self.from_memory(&cache_key, opts) {
            crate::metrics::record_coalesced_miss();
            self.record(Tier::Memory, true);
            return Ok(Some(value));
        }
        self.record(Tier::Memory, false);
        self.resolve_miss(collection, key, &cache_key, fetcher, opts).await
    }

    fn from_memory<T: DeserializeOwned>(&self, cache_key: &str, opts: &CacheOptions) -> Option<T> {
        if opts.skip_memory {
            return None;
        }
        let value = self.memory.get(cache_key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %cache_key, error = %e, "Volatile entry has unexpected shape, dropping");
                self.memory.remove(cache_key);
                None
            }
        }
    }

    async fn resolve_miss<F>(
        &self,
        collection: Collection,
        key: &str,
        cache_key: &str,
        fetcher: &F,
        opts: &CacheOptions,
    ) -> Result<Option<F::Output>, CacheError<F::Error>>
    where
        F: Fetcher,
        F::Output: Serialize + DeserializeOwned,
    {
        if !opts.skip_durable {
            match self.durable.get::<Value>(collection, key).await {
                Ok(Some(value)) => match serde_json::from_value::<F::Output>(value.clone()) {
                    Ok(data) => {
                        self.record(Tier::Durable, true);
                        if !opts.skip_memory {
                            debug!(collection = %collection, key = %key, "Promoting durable hit");
                            self.memory.insert(cache_key, value, self.memory_ttl(opts));
                        }
                        return Ok(Some(data));
                    }
                    Err(e) => {
                        warn!(collection = %collection, key = %key, error = %e, "Durable entry has unexpected shape, refetching");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(collection = %collection, key = %key, error = %e, "Durable tier read failed, treating as miss");
                }
            }
            self.record(Tier::Durable, false);
        }

        let fetch_start = Instant::now();
        let fetched = fetcher.fetch().await;
        crate::metrics::record_fetch_latency(collection.as_str(), fetch_start.elapsed());

        match fetched {
            Ok(Some(data)) => {
                self.record(Tier::Fetch, true);
                match serde_json::to_value(&data) {
                    Ok(value) => self.write_through(collection, key, cache_key, value, opts).await,
                    Err(e) => {
                        warn!(collection = %collection, key = %key, error = %e, "Fetched value not serializable, skipping write-through");
                    }
                }
                Ok(Some(data))
            }
            Ok(None) => {
                self.record(Tier::Fetch, false);
                debug!(collection = %collection, key = %key, "Fetcher returned no record");
                Ok(None)
            }
            Err(e) => {
                self.record(Tier::Fetch, false);
                Err(CacheError::Fetch(e))
            }
        }
    }

    async fn write_through(
        &self,
        collection: Collection,
        key: &str,
        cache_key: &str,
        value: Value,
        opts: &CacheOptions,
    ) {
        if !opts.skip_durable {
            if let Err(e) = self
                .durable
                .set(collection, key, &value, Some(self.durable_ttl(opts)))
                .await
            {
                warn!(collection = %collection, key = %key, error = %e, "Durable write-through failed");
                crate::metrics::record_write_through_error(Tier::Durable.label());
            }
        }
        if !opts.skip_memory {
            self.memory.insert(cache_key, value, self.memory_ttl(opts));
        }
    }

    /// Write through both tiers without fetching.
    ///
    /// Only serialization fails the call; a durable write error is logged.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        key: &str,
        data: &T,
        opts: &CacheOptions,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(data)?;
        let cache_key = Self::cache_key(collection, key);
        self.write_through(collection, key, &cache_key, value, opts).await;
        Ok(())
    }

    /// Remove a key from both tiers.
    pub async fn invalidate(&self, collection: Collection, key: &str) -> Result<(), StorageError> {
        self.memory.remove(&Self::cache_key(collection, key));
        self.durable.delete(collection, key).await
    }

    /// Clear both tiers for one collection.
    pub async fn clear_store(&self, collection: Collection) -> Result<(), StorageError> {
        let removed = self.memory.remove_prefix(&format!("{collection}:"));
        debug!(collection = %collection, removed, "Cleared volatile entries");
        self.durable.clear(collection).await
    }

    /// Drop expired entries from both tiers, returning the durable count.
    pub async fn clear_expired(&self, collection: Collection) -> Result<usize, StorageError> {
        self.memory.purge_expired(&format!("{collection}:"));
        self.durable.clear_expired(collection).await
    }

    #[must_use]
    pub fn get_metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = CacheMetrics::default();
    }

    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    #[must_use]
    pub fn durable(&self) -> &LocalStore {
        &self.durable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_with(config: CacheConfig) -> TieredCache {
        TieredCache::new(LocalStore::new(Arc::new(InMemoryStore::new())), config)
    }

    fn cache() -> TieredCache {
        cache_with(CacheConfig::default())
    }

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        value: Value,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Value>, String>> + Send>>
           + Send
           + Sync {
        move || {
            let calls = calls.clone();
            let value = value.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(value))
            })
        }
    }

    #[tokio::test]
    async fn test_miss_fetches_and_writes_both_tiers() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(calls.clone(), json!({"id": "p1"}));

        let got = cache
            .get(Collection::Places, "p1", &fetcher, &CacheOptions::default())
            .await
            .unwrap();
        assert_eq!(got, Some(json!({"id": "p1"})));

        assert_eq!(cache.memory.get("places:p1"), Some(json!({"id": "p1"})));
        let durable: Option<Value> = cache.durable().get(Collection::Places, "p1").await.unwrap();
        assert_eq!(durable, Some(json!({"id": "p1"})));

        let m = cache.get_metrics();
        assert_eq!(m.l3_hits, 1);
        assert_eq!(m.l1_misses, 1);
        assert_eq!(m.l2_misses, 1);
        assert_eq!(m.total_requests, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_get_hits_memory() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(calls.clone(), json!(7));
        let opts = CacheOptions::default();

        cache.get(Collection::Places, "p1", &fetcher, &opts).await.unwrap();
        cache.get(Collection::Places, "p1", &fetcher, &opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let m = cache.get_metrics();
        assert_eq!(m.l1_hits, 1);
        assert_eq!(m.total_requests, 2);
        assert!((m.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_durable_hit_promotes_to_memory() {
        let cache = cache();
        cache
            .durable()
            .set(Collection::Restaurants, "r1", &json!({"id": "r1"}), None)
            .await
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(calls.clone(), json!("unused"));
        let opts = CacheOptions::default();

        let got = cache.get(Collection::Restaurants, "r1", &fetcher, &opts).await.unwrap();
        assert_eq!(got, Some(json!({"id": "r1"})));
        assert_eq!(cache.memory.get("restaurants:r1"), Some(json!({"id": "r1"})));

        cache.get(Collection::Restaurants, "r1", &fetcher, &opts).await.unwrap();
        let m = cache.get_metrics();
        assert_eq!(m.l2_hits, 1);
        assert_eq!(m.l1_hits, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_memory_entry_refetches() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(calls.clone(), json!(1));
        let opts = CacheOptions::default()
            .with_memory_ttl(Duration::from_millis(5))
            .with_durable_ttl(Duration::from_millis(5));

        cache.get(Collection::Places, "p1", &fetcher, &opts).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        cache.get(Collection::Places, "p1", &fetcher, &opts).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get_metrics().l3_hits, 2);
    }

    #[tokio::test]
    async fn test_fetch_none_caches_nothing() {
        let cache = cache();
        let fetcher = || async { Ok::<Option<Value>, String>(None) };

        let got = cache
            .get(Collection::Places, "missing", &fetcher, &CacheOptions::default())
            .await
            .unwrap();
        assert!(got.is_none());
        assert_eq!(cache.memory_len(), 0);
        assert_eq!(cache.get_metrics().l3_misses, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned() {
        let cache = cache();
        let fetcher = || async { Err::<Option<Value>, _>("backend 503".to_string()) };

        let err = cache
            .get(Collection::Places, "p1", &fetcher, &CacheOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Fetch(ref msg) if msg == "backend 503"));
    }

    #[tokio::test]
    async fn test_skip_flags_bypass_tiers() {
        let cache = cache();
        let fetcher = || async { Ok::<_, String>(Some(json!(1))) };

        cache
            .get(Collection::Places, "m", &fetcher, &CacheOptions::memory_only())
            .await
            .unwrap();
        assert_eq!(cache.durable().count(Collection::Places).await.unwrap(), 0);
        assert_eq!(cache.memory_len(), 1);

        cache
            .get(Collection::Places, "d", &fetcher, &CacheOptions::durable_only())
            .await
            .unwrap();
        assert_eq!(cache.durable().count(Collection::Places).await.unwrap(), 1);
        assert_eq!(cache.memory_len(), 1);
    }

    #[tokio::test]
    async fn test_set_twice_is_idempotent() {
        let cache = cache();
        let opts = CacheOptions::default();
        cache.set(Collection::Places, "p1", &json!({"id": "p1"}), &opts).await.unwrap();
        cache.set(Collection::Places, "p1", &json!({"id": "p1"}), &opts).await.unwrap();

        assert_eq!(cache.durable().count(Collection::Places).await.unwrap(), 1);
        assert_eq!(cache.memory_len(), 1);
        let fetcher = || async { Err::<Option<Value>, _>("should not fetch".to_string()) };
        let got = cache.get(Collection::Places, "p1", &fetcher, &opts).await.unwrap();
        assert_eq!(got, Some(json!({"id": "p1"})));
    }

    #[tokio::test]
    async fn test_invalidate_and_clear_store() {
        let cache = cache();
        let opts = CacheOptions::default();
        cache.set(Collection::Places, "p1", &json!(1), &opts).await.unwrap();
        cache.set(Collection::Places, "p2", &json!(2), &opts).await.unwrap();
        cache.set(Collection::Restaurants, "r1", &json!(3), &opts).await.unwrap();

        cache.invalidate(Collection::Places, "p1").await.unwrap();
        assert!(cache.memory.get("places:p1").is_none());
        assert_eq!(cache.durable().count(Collection::Places).await.unwrap(), 1);

        cache.clear_store(Collection::Places).await.unwrap();
        assert_eq!(cache.durable().count(Collection::Places).await.unwrap(), 0);
        assert_eq!(cache.memory_len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_are_coalesced() {
        let cache = Arc::new(cache());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let fetcher = move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(Some(json!("shared")))
                    }
                };
                cache
                    .get(Collection::Places, "hot", &fetcher, &CacheOptions::default())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(json!("shared")));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_miss_releases_key_lock() {
        let cache = cache();
        let hung = || std::future::pending::<Result<Option<Value>, String>>();

        // One caller stuck in the fetcher, one queued behind it on the key lock
        let opts = CacheOptions::default();
        let fetching = cache.get(Collection::Places, "slow", &hung, &opts);
        let waiting = cache.get(Collection::Places, "slow", &hung, &opts);
        let both = async { tokio::join!(fetching, waiting) };
        assert!(tokio::time::timeout(Duration::from_millis(20), both).await.is_err());
        assert!(cache.in_flight.is_empty());

        let fetcher = || async { Ok::<_, String>(Some(json!(7))) };
        let got = cache
            .get(Collection::Places, "slow", &fetcher, &CacheOptions::default())
            .await
            .unwrap();
        assert_eq!(got, Some(json!(7)));
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_durable_ttl_keeps_record() {
        let cache = cache();
        let opts = CacheOptions::durable_only().with_durable_ttl(Duration::MAX);
        cache.set(Collection::Places, "p1", &json!({"id": "p1"}), &opts).await.unwrap();

        let item = cache.durable().get_item(Collection::Places, "p1").await.unwrap().unwrap();
        assert_eq!(item.expires_at, Some(i64::MAX));
        assert_eq!(
            cache.durable().get::<Value>(Collection::Places, "p1").await.unwrap(),
            Some(json!({"id": "p1"}))
        );
    }

    #[tokio::test]
    async fn test_without_coalescing_each_miss_fetches() {
        let cache = Arc::new(cache_with(CacheConfig {
            coalesce_misses: false,
            ..CacheConfig::default()
        }));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let fetcher = move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(Some(json!(1)))
                    }
                };
                cache
                    .get(Collection::Places, "hot", &fetcher, &CacheOptions::default())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_reset_metrics() {
        let cache = cache();
        cache.set(Collection::Places, "p1", &json!(1), &CacheOptions::default()).await.unwrap();
        let fetcher = || async { Ok::<Option<Value>, String>(None) };
        cache.get(Collection::Places, "p1", &fetcher, &CacheOptions::default()).await.unwrap();
        assert_eq!(cache.get_metrics().total_requests, 1);

        cache.reset_metrics();
        assert_eq!(cache.get_metrics(), CacheMetrics::default());
    }

    #[test]
    fn test_incremental_mean() {
        let mut m = CacheMetrics::default();
        for ms in [10.0, 20.0, 30.0, 40.0] {
            m.record_response(ms);
        }
        assert_eq!(m.total_requests, 4);
        assert!((m.avg_response_time_ms - 25.0).abs() < 1e-9);
        assert_eq!(CacheMetrics::default().hit_rate(), 0.0);
    }
}
