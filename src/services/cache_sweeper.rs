//! Background sweeper for the TTL cache.
//!
//! Lookups already expire entries lazily; the sweeper only bounds how long
//! expired-but-untouched entries occupy memory. Each run goes through
//! [`ConcurrentTtlCache::purge_expired`], so it takes the same lock as every
//! other cache operation.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::domain::models::CacheConfig;
use crate::services::ttl_cache::ConcurrentTtlCache;

/// Configuration for the cache sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweeps.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl SweeperConfig {
    /// Create config with custom interval.
    pub const fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Sweeper settings from cache configuration, `None` when sweeping is off.
    pub fn from_cache_config(config: &CacheConfig) -> Option<Self> {
        config
            .sweep_interval_seconds
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map(Self::with_interval)
    }
}

/// Status of the sweeper.
#[derive(Debug, Clone, Default)]
pub struct SweeperStatus {
    /// Whether the sweep loop is running.
    pub running: bool,
    /// Completed sweeps.
    pub total_runs: u64,
    /// Entries removed across all sweeps.
    pub total_purged: u64,
    /// Wall-clock time of the last sweep.
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Handle to control a running sweeper.
#[derive(Debug, Clone)]
pub struct SweeperHandle {
    stop_flag: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    status: Arc<RwLock<SweeperStatus>>,
}

impl SweeperHandle {
    /// Request the sweeper to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.stop_signal.notify_one();
    }

    /// Check if stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    /// Get current sweeper status.
    pub async fn status(&self) -> SweeperStatus {
        self.status.read().await.clone()
    }
}

/// Periodically purges expired entries from a [`ConcurrentTtlCache`].
pub struct CacheSweeper<K, V> {
    cache: ConcurrentTtlCache<K, V>,
    config: SweeperConfig,
    stop_flag: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    status: Arc<RwLock<SweeperStatus>>,
}

impl<K, V> CacheSweeper<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a sweeper for the given cache handle.
    pub fn new(cache: ConcurrentTtlCache<K, V>, config: SweeperConfig) -> Self {
        Self {
            cache,
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            status: Arc::new(RwLock::new(SweeperStatus::default())),
        }
    }

    /// Get a handle to control the sweeper.
    pub fn handle(&self) -> SweeperHandle {
        SweeperHandle {
            stop_flag: self.stop_flag.clone(),
            stop_signal: self.stop_signal.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the sweep loop on the current tokio runtime.
    pub fn spawn(self) -> (SweeperHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(async move {
            self.run_loop().await;
        });
        (handle, task)
    }

    async fn run_loop(self) {
        self.status.write().await.running = true;
        info!(interval = ?self.config.interval, "cache sweeper started");

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; sweeping an empty cache at start is pointless.
        ticker.tick().await;

        while !self.stop_flag.load(Ordering::Acquire) {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    self.sweep_once().await;
                }
                () = self.stop_signal.notified() => {}
            }
        }

        self.status.write().await.running = false;
        info!("cache sweeper stopped");
    }

    async fn sweep_once(&self) {
        let purged = self.cache.purge_expired();

        let mut status = self.status.write().await;
        status.total_runs += 1;
        status.total_purged += purged as u64;
        status.last_run_at = Some(Utc::now());
        debug!(run = status.total_runs, purged, "cache sweep completed");
    }
}
