pub mod cache;
pub mod config;

pub use cache::{CacheEntry, CacheStats};
pub use config::{CacheConfig, Config, LogFormat, LoggingConfig, RotationPolicy};
