use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::errors::CacheError;
use crate::domain::models::config::Config;

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "ROUTING_CACHE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid cache settings: {0}")]
    InvalidCache(#[from] CacheError),

    #[error("Invalid sweep_interval_seconds: {0}. Must be a finite number greater than 0")]
    InvalidSweepInterval(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .routing-cache/config.yaml (project config)
    /// 3. .routing-cache/local.yaml (local overrides, optional)
    /// 4. Environment variables (`ROUTING_CACHE_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".routing-cache/config.yaml"))
            .merge(Yaml::file(".routing-cache/local.yaml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let cache = &config.cache;
        cache.validate()?;

        if let Some(interval) = cache.sweep_interval_seconds {
            if !interval.is_finite() || interval <= 0.0 {
                return Err(ConfigError::InvalidSweepInterval(interval));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{LogFormat, RotationPolicy};
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.cache.ttl_seconds - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.cache.max_size, 1000);
        assert!(config.cache.sweep_interval_seconds.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
cache:
  ttl_seconds: 120.5
  max_size: 64
  sweep_interval_seconds: 30
logging:
  level: debug
  format: pretty
  rotation: hourly
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert!((config.cache.ttl_seconds - 120.5).abs() < f64::EPSILON);
        assert_eq!(config.cache.max_size, 64);
        assert_eq!(config.cache.sweep_interval_seconds, Some(30.0));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.rotation, RotationPolicy::Hourly);
        assert!(config.logging.enable_stdout);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("cache:\n  max_size: 5\n").unwrap();
        assert_eq!(config.cache.max_size, 5);
        assert!((config.cache.ttl_seconds - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = Config::default();
        config.cache.ttl_seconds = 0.0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidCache(CacheError::InvalidTtl(_))
        ));
    }

    #[test]
    fn test_validate_nan_ttl() {
        let mut config = Config::default();
        config.cache.ttl_seconds = f64::NAN;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidCache(CacheError::InvalidTtl(_))
        ));
    }

    #[test]
    fn test_validate_zero_max_size() {
        let mut config = Config::default();
        config.cache.max_size = 0;

        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidCache(CacheError::InvalidMaxSize(0))
        ));
        // Same wording as the error the cache constructor reports
        assert_eq!(
            err.to_string(),
            format!("Invalid cache settings: {}", CacheError::InvalidMaxSize(0))
        );
    }

    #[test]
    fn test_validate_negative_sweep_interval() {
        let mut config = Config::default();
        config.cache.sweep_interval_seconds = Some(-2.0);

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidSweepInterval(_)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "cache:\n  ttl_seconds: 45\n  max_size: 12").unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert!((config.cache.ttl_seconds - 45.0).abs() < f64::EPSILON);
        assert_eq!(config.cache.max_size, 12);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "cache:\n  max_size: 0").unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("ROUTING_CACHE_CACHE__TTL_SECONDS", Some("42.5")),
                ("ROUTING_CACHE_CACHE__MAX_SIZE", Some("250")),
                ("ROUTING_CACHE_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load().expect("env config should load");
                assert!((config.cache.ttl_seconds - 42.5).abs() < f64::EPSILON);
                assert_eq!(config.cache.max_size, 250);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_env_override_is_validated() {
        temp_env::with_var("ROUTING_CACHE_CACHE__MAX_SIZE", Some("0"), || {
            assert!(ConfigLoader::load().is_err());
        });
    }
}
