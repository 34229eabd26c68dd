use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::errors::{CacheError, CacheResult};

/// Main configuration structure for the routing cache service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Routing decision cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache sizing and expiry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum entry age in seconds before it is treated as absent
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: f64,

    /// Maximum number of live entries
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Interval for the optional background sweeper (disabled when unset)
    #[serde(default)]
    pub sweep_interval_seconds: Option<f64>,
}

/// Routing decisions stay valid for five minutes.
const fn default_ttl_seconds() -> f64 {
    300.0
}

const fn default_max_size() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_size: default_max_size(),
            sweep_interval_seconds: None,
        }
    }
}

impl CacheConfig {
    /// Check construction limits, returning the TTL as a `Duration`.
    ///
    /// The TTL must be finite and positive and `max_size` at least 1.
    pub fn check_limits(ttl_seconds: f64, max_size: usize) -> CacheResult<Duration> {
        if !ttl_seconds.is_finite() || ttl_seconds <= 0.0 {
            return Err(CacheError::InvalidTtl(ttl_seconds));
        }
        if max_size == 0 {
            return Err(CacheError::InvalidMaxSize(max_size));
        }
        Duration::try_from_secs_f64(ttl_seconds).map_err(|_| CacheError::InvalidTtl(ttl_seconds))
    }

    /// Validate this configuration's limits.
    pub fn validate(&self) -> CacheResult<Duration> {
        Self::check_limits(self.ttl_seconds, self.max_size)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files (optional, if None logs only to stdout)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Enable stdout logging
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Log rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines
    #[default]
    Json,
    /// Human-readable multi-line output
    Pretty,
}

/// Rotation policy for file logging
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// Rotate once per day
    #[default]
    Daily,
    /// Rotate once per hour
    Hourly,
    /// Single file, never rotated
    Never,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}
