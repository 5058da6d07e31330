//! Storage backends for the artifact cache
//!
//! [`ArtifactCache`](crate::cache::ArtifactCache) owns key derivation,
//! expiry and eviction policy; a backend only stores bytes per
//! `(kind, key)`. Backend calls are blocking and are run on tokio's
//! blocking pool by the cache.

mod disk;
mod memory;

pub use disk::FileSystemBackend;
pub use memory::MemoryBackend;

use crate::cache::entry::{EntryMetadata, StoredBlob};
use crate::cache::key::CacheKey;
use crate::cache::types::ArtifactKind;
use crate::error::Result;
use std::fmt::Debug;

pub trait CacheBackend: Send + Sync + Debug {
    /// Short name for log lines
    fn name(&self) -> &'static str;

    /// Store bytes, replacing any existing entry (last writer wins)
    fn write(&self, kind: ArtifactKind, key: &CacheKey, bytes: &[u8]) -> Result<EntryMetadata>;

    /// Fetch an entry; `Ok(None)` when absent
    fn read(&self, kind: ArtifactKind, key: &CacheKey) -> Result<Option<StoredBlob>>;

    /// Remove an entry; returns whether something was removed
    fn remove(&self, kind: ArtifactKind, key: &CacheKey) -> Result<bool>;

    /// Metadata of every stored entry
    fn list(&self) -> Result<Vec<EntryMetadata>>;

    /// Remove all entries, or all entries of one kind; returns the count
    fn clear(&self, kind: Option<ArtifactKind>) -> Result<usize>;
}
