//! Eviction bookkeeping
//!
//! Entries leave the cache for three reasons: they outlived the max age,
//! the total size exceeded the budget, or someone cleared the cache.
//! Every removal pass produces an [`EvictionReport`].

use crate::cache::entry::EntryMetadata;
use crate::cache::key::CacheKey;
use crate::cache::types::ArtifactKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Entry age reached the configured max age
    Expired,

    /// Removed oldest-first to fit the size budget
    SizeBudget,

    /// Removed by an explicit clear
    Cleared,

    /// Payload could not be decoded
    Corrupt,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::Expired => write!(f, "max age exceeded"),
            EvictionReason::SizeBudget => write!(f, "size budget exceeded"),
            EvictionReason::Cleared => write!(f, "cleared"),
            EvictionReason::Corrupt => write!(f, "corrupt payload"),
        }
    }
}

/// Entries removed by one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionReport {
    pub reason: EvictionReason,

    /// When the pass ran
    pub timestamp: DateTime<Utc>,

    /// Removed entries, in removal order
    pub entries: Vec<EntryMetadata>,

    /// Kind scope of a clear; `None` means all kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ArtifactKind>,
}

impl EvictionReport {
    pub fn new(reason: EvictionReason, entries: Vec<EntryMetadata>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            entries,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Option<ArtifactKind>) -> Self {
        self.scope = scope;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn freed_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|e| &e.key)
    }
}

impl fmt::Display for EvictionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries ({} bytes) removed: {}",
            self.len(),
            self.freed_bytes(),
            self.reason
        )
    }
}

/// Outcome of a maintenance pass (expiry, then size budget)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub expired: EvictionReport,
    pub size_budget: EvictionReport,
}

impl MaintenanceReport {
    pub fn total_removed(&self) -> usize {
        self.expired.len() + self.size_budget.len()
    }

    pub fn freed_bytes(&self) -> u64 {
        self.expired.freed_bytes() + self.size_budget.freed_bytes()
    }
}
