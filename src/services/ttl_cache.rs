//! Concurrent TTL + LRU cache.
//!
//! Entries expire lazily once their age exceeds the configured TTL and the
//! least recently used entry is evicted when a new key would overflow
//! `max_size`. Map, recency order and counters sit behind a single
//! `parking_lot` mutex that is never held across an `.await`, so one handle
//! serves OS threads and tokio tasks alike.
//!
//! `get_or_compute` adds cache-aside population with per-key coalescing:
//! concurrent callers for the same missing key share one producer run.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::models::{CacheConfig, CacheEntry, CacheStats};

/// Maps a key to the scope (e.g. conversation id) it belongs to.
///
/// Runs inside the cache's critical section, so it must be cheap and free of
/// side effects.
pub type ScopeExtractor<K> = Arc<dyn Fn(&K) -> Option<String> + Send + Sync>;

type Computation<V> = Shared<BoxFuture<'static, Result<V, Arc<anyhow::Error>>>>;

/// Thread-safe, async-safe cache with TTL expiry and LRU eviction.
///
/// Cloning the handle shares the same underlying storage.
pub struct ConcurrentTtlCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

struct CacheInner<K, V> {
    ttl: Duration,
    max_size: usize,
    scope_extractor: Option<ScopeExtractor<K>>,
    state: Mutex<CacheState<K, V>>,
}

struct CacheState<K, V> {
    /// Iteration order is most recently used first.
    entries: LruCache<K, CacheEntry<V>>,
    in_flight: HashMap<K, Computation<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> CacheState<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            in_flight: HashMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    fn lookup<Q>(&mut self, key: &Q, now: Instant, ttl: Duration) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired(now, ttl),
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired {
            self.entries.pop(key);
            self.expirations += 1;
            self.misses += 1;
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        self.hits += 1;
        Some(entry.value.clone())
    }

    /// Insert or overwrite, returning how many entries were evicted.
    fn store(&mut self, key: K, value: V, now: Instant, ttl: Duration, max_size: usize) -> usize {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refresh(value, now);
            return 0;
        }

        // Only the LRU tail is inspected; expired entries further in wait for
        // a lookup, `stats` or the sweeper.
        while self.entries.len() >= max_size
            && self
                .entries
                .peek_lru()
                .is_some_and(|(_, entry)| entry.is_expired(now, ttl))
        {
            self.entries.pop_lru();
            self.expirations += 1;
        }

        let mut evicted = 0;
        while self.entries.len() >= max_size {
            if self.entries.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        self.evictions += evicted as u64;

        self.entries.put(key, CacheEntry::new(value, now));
        evicted
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            size: self.entries.len(),
            in_flight: self.in_flight.len(),
        }
    }
}

impl<K, V> ConcurrentTtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache without scope support.
    ///
    /// Fails with [`CacheError::InvalidTtl`] unless `ttl_seconds` is finite
    /// and positive, and with [`CacheError::InvalidMaxSize`] when `max_size`
    /// is zero.
    pub fn new(ttl_seconds: f64, max_size: usize) -> CacheResult<Self> {
        Self::build(ttl_seconds, max_size, None)
    }

    /// Create a cache whose entries can be invalidated per scope.
    pub fn with_scope_extractor<F>(ttl_seconds: f64, max_size: usize, extractor: F) -> CacheResult<Self>
    where
        F: Fn(&K) -> Option<String> + Send + Sync + 'static,
    {
        Self::build(ttl_seconds, max_size, Some(Arc::new(extractor)))
    }

    /// Create a cache from loaded configuration.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        Self::new(config.ttl_seconds, config.max_size)
    }

    fn build(
        ttl_seconds: f64,
        max_size: usize,
        scope_extractor: Option<ScopeExtractor<K>>,
    ) -> CacheResult<Self> {
        let ttl = CacheConfig::check_limits(ttl_seconds, max_size)?;

        Ok(Self {
            inner: Arc::new(CacheInner {
                ttl,
                max_size,
                scope_extractor,
                state: Mutex::new(CacheState::new()),
            }),
        })
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Configured capacity.
    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Whether [`invalidate_scope`](Self::invalidate_scope) is available.
    pub fn is_scoped(&self) -> bool {
        self.inner.scope_extractor.is_some()
    }

    /// Look up a live entry, promoting it to most recently used.
    ///
    /// Counts exactly one hit or miss. Expired entries are removed and
    /// reported as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.inner.state.lock().lookup(key, now, self.inner.ttl)
    }

    /// Insert or overwrite a value.
    ///
    /// Overwriting refreshes the entry's age and recency and never counts as
    /// an eviction. A new key in a full cache first drops expired entries,
    /// then evicts the least recently used one.
    pub fn set(&self, key: K, value: V) {
        let now = Instant::now();
        let evicted = self
            .inner
            .state
            .lock()
            .store(key, value, now, self.inner.ttl, self.inner.max_size);

        if evicted > 0 {
            debug!(evicted, max_size = self.inner.max_size, "evicted least recently used cache entry");
        }
    }

    /// Remove a single entry, returning whether one was present.
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.state.lock().entries.pop(key).is_some()
    }

    /// Remove every entry whose key maps to `scope_id`.
    pub fn invalidate_scope(&self, scope_id: &str) -> CacheResult<usize> {
        let extractor = self
            .inner
            .scope_extractor
            .as_ref()
            .ok_or(CacheError::ScopeExtractorMissing)?;

        let removed = {
            let mut state = self.inner.state.lock();
            let doomed: Vec<K> = state
                .entries
                .iter()
                .filter(|(key, _)| (**extractor)(*key).as_deref() == Some(scope_id))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &doomed {
                state.entries.pop(key);
            }
            doomed.len()
        };

        debug!(scope = scope_id, removed, "invalidated cache scope");
        Ok(removed)
    }

    /// Remove all entries. Counters are cumulative and survive a clear.
    pub fn clear(&self) {
        let cleared = {
            let mut state = self.inner.state.lock();
            let cleared = state.entries.len();
            state.entries.clear();
            cleared
        };
        debug!(cleared, "cleared cache");
    }

    /// Drop every expired entry now instead of waiting for the next lookup.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let purged = self.inner.state.lock().purge_expired(now, self.inner.ttl);
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }

    /// Consistent snapshot of counters and live size.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        state.purge_expired(now, self.inner.ttl);
        state.snapshot()
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// At most one producer runs per key at a time; concurrent callers for
    /// the same missing key await that run and receive its result. A failed
    /// or panicking producer stores nothing, every waiting caller gets the
    /// same [`CacheError::ProducerFailed`], and the next call retries.
    /// Dropping a caller mid-wait is safe: once every caller for a key is
    /// gone, its computation is discarded and the next call starts afresh.
    pub async fn get_or_compute<F, Fut>(&self, key: K, producer: F) -> CacheResult<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let (pending, joined) = {
            let mut state = self.inner.state.lock();
            if let Some(value) = state.lookup(&key, Instant::now(), self.inner.ttl) {
                return Ok(value);
            }

            let existing = state.in_flight.get(&key).cloned();
            if let Some(pending) = existing {
                (pending, true)
            } else {
                let pending = self.computation(key.clone(), producer);
                state.in_flight.insert(key.clone(), pending.clone());
                (pending, false)
            }
        };

        if joined {
            debug!("joined in-flight cache computation");
        }

        InFlightWaiter {
            inner: &*self.inner,
            key,
            pending: Some(pending),
        }
        .await
        .map_err(CacheError::ProducerFailed)
    }

    /// Build the shared future that runs `producer` and settles the key.
    ///
    /// Holds only a weak reference so an abandoned computation cannot keep
    /// the cache alive.
    fn computation<F, Fut>(&self, key: K, producer: F) -> Computation<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let cache: Weak<CacheInner<K, V>> = Arc::downgrade(&self.inner);

        async move {
            let outcome = match AssertUnwindSafe(async move { producer().await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(payload) => Err(anyhow::anyhow!(
                    "producer panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };

            if let Some(inner) = cache.upgrade() {
                let evicted = {
                    let mut state = inner.state.lock();
                    state.in_flight.remove(&key);
                    match &outcome {
                        Ok(value) => {
                            state.store(key, value.clone(), Instant::now(), inner.ttl, inner.max_size)
                        }
                        Err(_) => 0,
                    }
                };
                if evicted > 0 {
                    debug!(evicted, "evicted least recently used cache entry");
                }
            }

            if let Err(err) = &outcome {
                warn!(error = %err, "cache producer failed; result not stored");
            }
            outcome.map_err(Arc::new)
        }
        .boxed()
        .shared()
    }
}

/// One caller's share of an in-flight computation.
///
/// A caller that goes away before the computation settles (a timeout, an
/// aborted task) releases its share on drop. The last one to leave removes
/// the computation from the in-flight table, which drops the suspended
/// producer with it.
struct InFlightWaiter<'a, K, V>
where
    K: Hash + Eq,
{
    inner: &'a CacheInner<K, V>,
    key: K,
    pending: Option<Computation<V>>,
}

impl<K: Hash + Eq, V> Unpin for InFlightWaiter<'_, K, V> {}

impl<K, V> Future for InFlightWaiter<'_, K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    type Output = Result<V, Arc<anyhow::Error>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(pending) = self.pending.as_mut() else {
            panic!("in-flight waiter polled after completion");
        };
        let outcome = ready!(pending.poll_unpin(cx));
        // A settled computation has already left the in-flight table.
        self.pending = None;
        Poll::Ready(outcome)
    }
}

impl<K, V> Drop for InFlightWaiter<'_, K, V>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        // Released under the lock so a concurrent join sees an accurate count.
        let abandoned = {
            let mut state = self.inner.state.lock();
            drop(pending);
            let orphaned = state
                .in_flight
                .get(&self.key)
                .is_some_and(|shared| shared.strong_count() == Some(1));
            if orphaned {
                state.in_flight.remove(&self.key)
            } else {
                None
            }
        };

        if abandoned.is_some() {
            debug!("dropped abandoned cache computation");
        }
    }
}

impl<K, V> Clone for ConcurrentTtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for ConcurrentTtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentTtlCache")
            .field("ttl", &self.inner.ttl)
            .field("max_size", &self.inner.max_size)
            .field("scoped", &self.inner.scope_extractor.is_some())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
