//! Routing Cache - concurrent TTL/LRU cache for agent routing decisions
//!
//! Routing a task to agents is an expensive reasoning step, so decisions are
//! cached per conversation for a bounded time and a bounded number of
//! entries.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): cache models, configuration and errors
//! - **Service Layer** (`services`): the cache itself, the background
//!   sweeper and the routing-decision decorator
//! - **Infrastructure Layer** (`infrastructure`): configuration loading and
//!   logging
//!
//! # Example
//!
//! ```
//! use routing_cache::ConcurrentTtlCache;
//!
//! let cache = ConcurrentTtlCache::new(300.0, 1000)?;
//! cache.set("conv-1::task".to_string(), "planner");
//! assert_eq!(cache.get("conv-1::task"), Some("planner"));
//! # Ok::<(), routing_cache::CacheError>(())
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{CacheConfig, CacheStats, Config, LoggingConfig};
pub use domain::{CacheError, CacheResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::LoggerImpl;
pub use services::{
    CacheSweeper, CachedRoutingPolicy, ConcurrentTtlCache, RoutingDecision, RoutingPolicy,
    RoutingRequest, SweeperConfig,
};
