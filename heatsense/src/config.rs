//! Analysis configuration
//!
//! One explicit [`AnalysisConfig`] is passed to the orchestrator; nothing is
//! read from global state after construction. Values come from defaults, an
//! optional YAML file, a performance mode, and environment overrides, in
//! that order.

use crate::error::{PipelineError, Result};
use heatsense_core::CacheConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Presets trading spatial detail for speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Preview,
    Fast,
    Standard,
    Detailed,
}

/// Parameters a performance mode sets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSettings {
    pub grid_resolution: f64,
    pub cloud_threshold: f64,
    pub hotspot_threshold: f64,
    pub min_cluster_size: usize,
    pub batch_size: usize,
    pub skip_temporal_trends: bool,
}

impl PerformanceMode {
    pub fn settings(&self) -> ModeSettings {
        match self {
            PerformanceMode::Preview => ModeSettings {
                grid_resolution: 300.0,
                cloud_threshold: 40.0,
                hotspot_threshold: 0.85,
                min_cluster_size: 3,
                batch_size: 1000,
                skip_temporal_trends: true,
            },
            PerformanceMode::Fast => ModeSettings {
                grid_resolution: 200.0,
                cloud_threshold: 30.0,
                hotspot_threshold: 0.9,
                min_cluster_size: 5,
                batch_size: 3000,
                skip_temporal_trends: true,
            },
            PerformanceMode::Standard => ModeSettings {
                grid_resolution: 100.0,
                cloud_threshold: 20.0,
                hotspot_threshold: 0.9,
                min_cluster_size: 5,
                batch_size: 5000,
                skip_temporal_trends: false,
            },
            PerformanceMode::Detailed => ModeSettings {
                grid_resolution: 50.0,
                cloud_threshold: 20.0,
                hotspot_threshold: 0.95,
                min_cluster_size: 10,
                batch_size: 2000,
                skip_temporal_trends: false,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceMode::Preview => "preview",
            PerformanceMode::Fast => "fast",
            PerformanceMode::Standard => "standard",
            PerformanceMode::Detailed => "detailed",
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(PerformanceMode::Preview),
            "fast" => Ok(PerformanceMode::Fast),
            "standard" => Ok(PerformanceMode::Standard),
            "detailed" => Ok(PerformanceMode::Detailed),
            other => Err(format!(
                "unknown performance mode '{}' (expected preview, fast, standard or detailed)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cache: CacheConfig,

    /// Mode last applied, for reporting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PerformanceMode>,

    /// Grid cell side length in metres
    pub grid_resolution: f64,

    /// Percentile (0..1) a cell temperature must exceed to be a hotspot candidate
    pub hotspot_threshold: f64,

    /// p-value cutoff of the local autocorrelation test
    pub significance_level: f64,

    /// Hotspot clusters smaller than this are discarded
    pub min_cluster_size: usize,

    /// Conditional permutations per cell for pseudo p-values
    pub permutations: usize,

    pub random_seed: u64,

    /// Maximum scene cloud cover in percent
    pub cloud_threshold: f64,

    /// Concurrent analysis branches
    pub worker_pool_size: usize,

    /// Cells per temperature sampling call
    pub batch_size: usize,

    /// Timeout for each external provider call
    pub external_timeout_secs: u64,

    pub skip_temporal_trends: bool,

    /// Extract one temperature per calendar month for trend slopes
    pub monthly_trend_sampling: bool,

    /// Radius around a weather station within which cells are compared
    pub station_buffer_m: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            mode: None,
            grid_resolution: 100.0,
            hotspot_threshold: 0.9,
            significance_level: 0.05,
            min_cluster_size: 5,
            permutations: 999,
            random_seed: 12345,
            cloud_threshold: 20.0,
            worker_pool_size: 3,
            batch_size: 3000,
            external_timeout_secs: 120,
            skip_temporal_trends: false,
            monthly_trend_sampling: false,
            station_buffer_m: 1000.0,
        }
    }
}

impl AnalysisConfig {
    /// Defaults with a performance mode applied
    pub fn for_mode(mode: PerformanceMode) -> Self {
        let mut config = Self::default();
        config.apply_mode(mode);
        config
    }

    pub fn apply_mode(&mut self, mode: PerformanceMode) {
        let s = mode.settings();
        self.grid_resolution = s.grid_resolution;
        self.cloud_threshold = s.cloud_threshold;
        self.hotspot_threshold = s.hotspot_threshold;
        self.min_cluster_size = s.min_cluster_size;
        self.batch_size = s.batch_size;
        self.skip_temporal_trends = s.skip_temporal_trends;
        self.mode = Some(mode);
    }

    /// Load from a YAML file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("invalid configuration: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Apply `HEATSENSE_MODE` and the cache overrides from the environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.cache.apply_env();
        if let Ok(mode) = std::env::var("HEATSENSE_MODE") {
            if !mode.is_empty() {
                let mode = mode.parse().map_err(PipelineError::Config)?;
                self.apply_mode(mode);
            }
        }
        Ok(())
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<()> {
        self.cache
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if !(self.grid_resolution.is_finite() && self.grid_resolution > 0.0) {
            return Err(PipelineError::Config(format!(
                "grid_resolution must be positive, got {}",
                self.grid_resolution
            )));
        }
        if !(self.hotspot_threshold > 0.0 && self.hotspot_threshold < 1.0) {
            return Err(PipelineError::Config(format!(
                "hotspot_threshold must be in (0, 1), got {}",
                self.hotspot_threshold
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(PipelineError::Config(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        if self.min_cluster_size == 0 {
            return Err(PipelineError::Config(
                "min_cluster_size must be at least 1".to_string(),
            ));
        }
        if self.permutations == 0 {
            return Err(PipelineError::Config(
                "permutations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.cloud_threshold) {
            return Err(PipelineError::Config(format!(
                "cloud_threshold must be in [0, 100], got {}",
                self.cloud_threshold
            )));
        }
        if self.worker_pool_size == 0 {
            return Err(PipelineError::Config(
                "worker_pool_size must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.external_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "external_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(self.station_buffer_m.is_finite() && self.station_buffer_m > 0.0) {
            return Err(PipelineError::Config(format!(
                "station_buffer_m must be positive, got {}",
                self.station_buffer_m
            )));
        }
        Ok(())
    }
}
