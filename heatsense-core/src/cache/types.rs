//! Core type definitions for the cache system

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Artifact kind, used as key discriminator and storage namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Grid,
    Boundary,
    #[serde(rename = "landcover")]
    LandCover,
    Temperature,
    CollectionMetadata,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Grid,
        ArtifactKind::Boundary,
        ArtifactKind::LandCover,
        ArtifactKind::Temperature,
        ArtifactKind::CollectionMetadata,
    ];

    /// Subdirectory name in the on-disk layout
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Grid => "grid",
            ArtifactKind::Boundary => "boundary",
            ArtifactKind::LandCover => "landcover",
            ArtifactKind::Temperature => "temperature",
            ArtifactKind::CollectionMetadata => "collection-metadata",
        }
    }

    /// File extension matching the serialization format
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::CollectionMetadata => "bin",
            _ => "geojson",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ArtifactKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(ArtifactKind::Grid),
            "boundary" => Ok(ArtifactKind::Boundary),
            "landcover" | "land-cover" => Ok(ArtifactKind::LandCover),
            "temperature" => Ok(ArtifactKind::Temperature),
            "collection-metadata" | "metadata" => Ok(ArtifactKind::CollectionMetadata),
            other => Err(CoreError::Other(format!("unknown artifact kind: {}", other))),
        }
    }
}

/// Entry count and size for one artifact kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct KindStats {
    pub entries: usize,
    pub size_bytes: u64,
}

/// Cache contents plus counters for the current process
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Number of entries currently stored
    pub entries: usize,

    /// Total size of stored payloads in bytes
    pub size_bytes: u64,

    /// Breakdown by artifact kind
    pub by_kind: BTreeMap<ArtifactKind, KindStats>,

    /// Successful lookups
    pub hits: u64,

    /// Lookups that found nothing usable (absent, expired or corrupt)
    pub misses: u64,

    /// Successful writes
    pub writes: u64,

    /// Writes that failed and were logged instead of raised
    pub failed_writes: u64,

    /// Entries removed because they exceeded the max age
    pub evictions_expired: u64,

    /// Entries removed to honour the size budget
    pub evictions_size: u64,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    pub fn total_evictions(&self) -> u64 {
        self.evictions_size + self.evictions_expired
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ entries: {}, size: {} bytes, hits: {}, misses: {}, hit_rate: {:.2}%, evictions: {} }}",
            self.entries,
            self.size_bytes,
            self.hits,
            self.misses,
            self.hit_rate(),
            self.total_evictions()
        )
    }
}
