//! Configuration for the artifact cache

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Entries older than this are treated as absent
pub const DEFAULT_MAX_AGE_DAYS: u64 = 30;

/// Total payload size the maintenance pass trims down to
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

const SECS_PER_DAY: u64 = 24 * 3600;

/// Configuration for the artifact cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory of the on-disk cache
    pub cache_dir: PathBuf,

    /// Maximum entry age
    #[serde(rename = "max_age_secs", with = "duration_secs")]
    pub max_age: Duration,

    /// Size budget enforced by maintenance
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_age: Duration::from_secs(DEFAULT_MAX_AGE_DAYS * SECS_PER_DAY),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
        }
    }
}

/// `$XDG_CACHE_HOME/heatsense` or the platform equivalent
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("heatsense")
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Defaults overridden from the environment (and a `.env` file)
    ///
    /// - `HEATSENSE_CACHE_DIR`
    /// - `HEATSENSE_CACHE_MAX_AGE_DAYS`
    /// - `HEATSENSE_CACHE_MAX_SIZE_GB`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply environment overrides on top of the current values
    ///
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        dotenv::dotenv().ok();

        if let Ok(dir) = std::env::var("HEATSENSE_CACHE_DIR") {
            if !dir.is_empty() {
                self.cache_dir = PathBuf::from(dir);
            }
        }

        if let Some(days) = std::env::var("HEATSENSE_CACHE_MAX_AGE_DAYS")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
        {
            self.max_age = Duration::from_secs_f64(days * SECS_PER_DAY as f64);
        }

        if let Some(gb) = std::env::var("HEATSENSE_CACHE_MAX_SIZE_GB")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|g| g.is_finite() && *g > 0.0)
        {
            self.max_size_bytes = (gb * 1024.0 * 1024.0 * 1024.0) as u64;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_age.is_zero() {
            return Err(CoreError::ConfigError(
                "max_age must be greater than 0".to_string(),
            ));
        }

        if self.max_size_bytes == 0 {
            return Err(CoreError::ConfigError(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(CoreError::ConfigError(
                "cache_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn max_age_days(&self) -> f64 {
        self.max_age.as_secs_f64() / SECS_PER_DAY as f64
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    cache_dir: Option<PathBuf>,
    max_age: Option<Duration>,
    max_size_bytes: Option<u64>,
}

impl CacheConfigBuilder {
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    pub fn max_age_days(mut self, days: u64) -> Self {
        self.max_age = Some(Duration::from_secs(days * SECS_PER_DAY));
        self
    }

    pub fn max_size_bytes(mut self, size: u64) -> Self {
        self.max_size_bytes = Some(size);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            max_age: self.max_age.unwrap_or(defaults.max_age),
            max_size_bytes: self.max_size_bytes.unwrap_or(defaults.max_size_bytes),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_age, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.max_size_bytes, 5 * 1024 * 1024 * 1024);
        assert!(config.cache_dir.ends_with("heatsense"));
        assert!((config.max_age_days() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());

        let invalid = CacheConfig::builder().max_size_bytes(0).build();
        assert!(invalid.validate().is_err());

        let invalid = CacheConfig::builder().max_age(Duration::ZERO).build();
        assert!(invalid.validate().is_err());

        let invalid = CacheConfig::builder().cache_dir("").build();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .cache_dir("/tmp/heat")
            .max_age_days(7)
            .max_size_bytes(1_000)
            .build();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/heat"));
        assert_eq!(config.max_age, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.max_size_bytes, 1_000);
    }

    #[test]
    fn test_max_age_serialized_in_seconds() {
        let config = CacheConfig::builder().max_age(Duration::from_secs(90)).build();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_age_secs"], 90.0);
        let back: CacheConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
