pub mod cache_sweeper;
pub mod routing_cache;
pub mod ttl_cache;

pub use cache_sweeper::{CacheSweeper, SweeperConfig, SweeperHandle, SweeperStatus};
pub use routing_cache::{
    conversation_scope, routing_key, CachedRoutingPolicy, ExecutionMode, RoutingDecision,
    RoutingPolicy, RoutingRequest,
};
pub use ttl_cache::{ConcurrentTtlCache, ScopeExtractor};
