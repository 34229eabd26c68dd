//! Domain errors for the routing cache.

use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by [`ConcurrentTtlCache`](crate::services::ConcurrentTtlCache).
///
/// A cache miss is not an error; lookups return `Option`.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Invalid ttl_seconds: {0}. Must be a finite number greater than 0")]
    InvalidTtl(f64),

    #[error("Invalid max_size: {0}. Must be at least 1")]
    InvalidMaxSize(usize),

    #[error("Scope invalidation requires a cache built with a scope extractor")]
    ScopeExtractorMissing,

    /// Shared by every caller that was coalesced onto the failed computation.
    #[error("Producer failed: {0}")]
    ProducerFailed(Arc<anyhow::Error>),
}

impl CacheError {
    /// Whether the error comes from invalid construction parameters.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidTtl(_) | Self::InvalidMaxSize(_))
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
