//! Memoizing fetch cache using moka
//!
//! [`CachedFetchResource`] wraps an async fetch function with a cache that is:
//! - keyed by the structure of the arguments ([`ArgsKey`])
//! - coalescing: concurrent callers with equal arguments share one fetch
//! - bounded in age: an entry expires `max_age` after its fetch *started*
//! - bounded in size: the least-recently-used entry is evicted first
//!
//! Failed fetches are never stored; the next call for the key fetches again.

use futures::future::BoxFuture;
use futures::FutureExt;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::key::ArgsKey;

pub(crate) type FetchFn<A, V, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

/// Cache limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries are not served once this long has passed since their fetch started
    #[serde(rename = "max_age_ms", with = "crate::duration_ms")]
    pub max_age: Duration,
    /// Maximum number of cached keys
    pub max_size: u64,
}

impl CacheConfig {
    /// Create default configuration (30s, 100 entries)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30),
            max_size: 100,
        }
    }
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls to `get`
    pub requests: u64,
    /// Underlying fetches issued
    pub fetches: u64,
    /// Approximate number of entries in cache
    pub entry_count: u64,
}

impl CacheStats {
    /// Requests answered without a fetch of their own (cached or coalesced)
    #[inline]
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.requests.saturating_sub(self.fetches)
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    fetches: AtomicU64,
}

#[derive(Clone)]
struct CachedValue<V> {
    value: V,
    fetch_started: Instant,
}

/// Expires entries relative to when their fetch began, not when it settled
struct FetchStartExpiry {
    max_age: Duration,
}

impl<V> Expiry<ArgsKey, CachedValue<V>> for FetchStartExpiry {
    fn expire_after_create(
        &self,
        _key: &ArgsKey,
        value: &CachedValue<V>,
        created_at: Instant,
    ) -> Option<Duration> {
        let fetch_time = created_at.saturating_duration_since(value.fetch_started);
        Some(self.max_age.saturating_sub(fetch_time))
    }
}

/// Async fetch function behind a coalescing, expiring, size-bounded cache
pub struct CachedFetchResource<A, V, E> {
    fetch: FetchFn<A, V, E>,
    cache: Cache<ArgsKey, CachedValue<V>>,
    config: CacheConfig,
    counters: Arc<Counters>,
    _args: PhantomData<fn(A)>,
}

impl<A, V, E> CachedFetchResource<A, V, E>
where
    A: Serialize + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Wrap `fetch` with a cache configured by `config`
    pub fn new<F, Fut>(fetch: F, config: CacheConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let cache = Cache::builder()
            .max_capacity(config.max_size)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(FetchStartExpiry {
                max_age: config.max_age,
            })
            .build();

        Self {
            fetch: Arc::new(move |args| fetch(args).boxed()),
            cache,
            config,
            counters: Arc::new(Counters::default()),
            _args: PhantomData,
        }
    }

    /// Get the value for `args`, fetching it if no live entry exists
    ///
    /// While a fetch for structurally equal arguments is in flight, this
    /// awaits that fetch instead of issuing another.
    ///
    /// # Errors
    /// - `CacheError::Key` if `args` cannot be keyed
    /// - `CacheError::Fetch` with the (shared) fetch error
    pub async fn get(&self, args: A) -> Result<V, CacheError<E>> {
        let key = ArgsKey::of(&args)?;
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dcat_cache_request_total").increment(1);

        let fetch = Arc::clone(&self.fetch);
        let counters = Arc::clone(&self.counters);
        let init = async move {
            counters.fetches.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("dcat_cache_fetch_total").increment(1);
            tracing::debug!(%key, "cache miss, fetching");

            let fetch_started = Instant::now();
            let result = fetch(args).await;
            match &result {
                Ok(_) => tracing::debug!(%key, elapsed = ?fetch_started.elapsed(), "fetch settled"),
                Err(err) => tracing::debug!(%key, error = %err, "fetch failed, not cached"),
            }
            result.map(|value| CachedValue {
                value,
                fetch_started,
            })
        };

        self.cache
            .try_get_with(key, init)
            .await
            .map(|entry| entry.value)
            .map_err(CacheError::Fetch)
    }

    /// Check if a live entry exists for `args` (does not count as a use)
    #[must_use]
    pub fn contains(&self, args: &A) -> bool {
        ArgsKey::of(args).is_ok_and(|key| self.cache.contains_key(&key))
    }

    /// Drop the entry for `args`
    pub async fn invalidate(&self, args: &A) {
        if let Ok(key) = ArgsKey::of(args) {
            self.cache.invalidate(&key).await;
        }
    }

    /// Drop every entry
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Apply pending evictions and expirations now
    ///
    /// Housekeeping is otherwise lazy, so `entry_count` may lag behind.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count(),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<A, V, E> Clone for CachedFetchResource<A, V, E>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            fetch: Arc::clone(&self.fetch),
            cache: self.cache.clone(),
            config: self.config,
            counters: Arc::clone(&self.counters),
            _args: PhantomData,
        }
    }
}

impl<A, V, E> fmt::Debug for CachedFetchResource<A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFetchResource")
            .field("config", &self.config)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
