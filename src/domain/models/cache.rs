//! Cache entry and statistics models.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A single cached value with its monotonic bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached payload.
    pub value: V,
    /// When the entry was created or last overwritten.
    pub inserted_at: Instant,
    /// When the entry was last returned by a lookup.
    pub last_accessed_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Create an entry stamped at `now`.
    pub const fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
        }
    }

    /// Age of the entry measured from its last insert.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    /// An entry is expired once its age strictly exceeds the TTL.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    /// Replace the payload and restart both clocks.
    pub fn refresh(&mut self, value: V, now: Instant) {
        self.value = value;
        self.inserted_at = now;
        self.last_accessed_at = now;
    }
}

/// Point-in-time snapshot of cache counters.
///
/// Counters are cumulative for the lifetime of the cache instance; `size`
/// reflects live entries only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that returned a value.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
    /// Entries removed to make room for a new key.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Live (non-expired) entries.
    pub size: usize,
    /// Keys with a computation currently running.
    pub in_flight: usize,
}

impl CacheStats {
    /// Total number of lookups.
    pub const fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that were hits, `0.0` before any lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
