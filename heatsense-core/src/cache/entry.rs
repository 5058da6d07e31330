//! Cache entry metadata

use crate::cache::artifact::Artifact;
use crate::cache::key::CacheKey;
use crate::cache::types::ArtifactKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the cache knows about a stored entry without reading its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub key: CacheKey,
    pub kind: ArtifactKind,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// Payload size on the backend
    pub size_bytes: u64,
}

impl EntryMetadata {
    /// Age of the entry at `now`; entries from the future have age zero
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// An entry is expired once its age reaches `max_age`
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) >= max_age
    }
}

/// Raw bytes as returned by a backend
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub metadata: EntryMetadata,
    pub bytes: Vec<u8>,
}

/// A decoded entry handed to callers
///
/// The payload is freshly decoded for every lookup, so callers own an
/// independent snapshot.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub metadata: EntryMetadata,
    pub payload: Artifact,
}

impl CacheEntry {
    pub fn key(&self) -> &CacheKey {
        &self.metadata.key
    }

    pub fn kind(&self) -> ArtifactKind {
        self.metadata.kind
    }

    pub fn into_payload(self) -> Artifact {
        self.payload
    }
}
