//! # HeatSense core (heatsense-core)
//!
//! Shared foundations for urban heat island analysis:
//!
//! - [`model`]: planar geometry, analysis grids, land-cover classification,
//!   weather stations and the GeoJSON codec
//! - [`cache`]: the content-addressed [`ArtifactCache`] with age- and
//!   size-bounded eviction over filesystem or in-memory backends
//! - [`logging`]: the [`LogContext`] handed to every component
//! - [`error`]: the [`CoreError`] taxonomy
//!
//! ```no_run
//! use heatsense_core::{ArtifactCache, CacheConfig, LogContext};
//!
//! fn main() -> heatsense_core::Result<()> {
//!     let log = LogContext::root("heatsense");
//!     let cache = ArtifactCache::open(CacheConfig::from_env(), &log)?;
//!     println!("cache at {}", cache.config().cache_dir.display());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod logging;
pub mod model;

// Re-export main types for convenience
pub use cache::{
    Artifact, ArtifactCache, ArtifactKind, CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey,
    CacheParams, CacheStats, EvictionReport, MaintenanceReport,
};
pub use error::{CoreError, Result};
pub use logging::LogContext;
