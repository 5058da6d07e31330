//! # Artifact cache
//!
//! Content-addressed store for intermediate analysis artifacts: grids,
//! boundaries, land-cover polygons, temperature grids and satellite
//! collection descriptors.
//!
//! ## Features
//!
//! - **Deterministic keys**: SHA-256 over a canonical, order-independent
//!   parameter map plus the artifact kind
//! - **Age bound**: entries older than `max_age` are misses and are removed by
//!   the next maintenance pass
//! - **Size bound**: maintenance removes entries oldest-first until the total
//!   fits `max_size_bytes`
//! - **Fail-open**: read faults and corrupt payloads are misses, failed writes
//!   are logged
//! - **Pluggable storage**: filesystem or in-memory backends behind
//!   [`CacheBackend`]
//!
//! ## Example
//!
//! ```rust
//! use heatsense_core::cache::{ArtifactCache, ArtifactKind, CacheConfig, CacheParams, Artifact};
//! use heatsense_core::logging::LogContext;
//! use heatsense_core::model::{AnalysisGrid, BoundingBox};
//!
//! # async fn example() -> heatsense_core::Result<()> {
//! let cache = ArtifactCache::in_memory(CacheConfig::default(), &LogContext::disabled());
//!
//! let params = CacheParams::new()
//!     .with("bbox", BoundingBox::new(0.0, 0.0, 1000.0, 1000.0))
//!     .with("resolution", 100.0);
//!
//! cache.put(&params, &Artifact::Grid(AnalysisGrid::empty(100.0))).await;
//!
//! if let Some(artifact) = cache.get(ArtifactKind::Grid, &params).await {
//!     let grid = artifact.into_grid()?;
//!     println!("cached grid with {} cells", grid.len());
//! }
//!
//! cache.maintain().await?;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod backend;
pub mod config;
pub mod entry;
pub mod eviction;
pub mod key;
pub mod store;
pub mod types;

pub use artifact::Artifact;
pub use backend::{CacheBackend, FileSystemBackend, MemoryBackend};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, EntryMetadata, StoredBlob};
pub use eviction::{EvictionReason, EvictionReport, MaintenanceReport};
pub use key::{CacheKey, CacheParams, ParamValue};
pub use store::ArtifactCache;
pub use types::{ArtifactKind, CacheStats, KindStats};
