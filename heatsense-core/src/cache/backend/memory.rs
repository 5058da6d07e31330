use crate::cache::backend::CacheBackend;
use crate::cache::entry::{EntryMetadata, StoredBlob};
use crate::cache::key::CacheKey;
use crate::cache::types::ArtifactKind;
use crate::error::{CoreError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Process-local backend; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<(ArtifactKind, CacheKey), StoredBlob>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an entry's timestamp into the past
    pub fn backdate(&self, kind: ArtifactKind, key: &CacheKey, by: Duration) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| CoreError::LockPoisoned)?;
        match entries.get_mut(&(kind, key.clone())) {
            Some(blob) => {
                let by = chrono::Duration::from_std(by)
                    .map_err(|e| CoreError::Other(e.to_string()))?;
                blob.metadata.created_at = blob.metadata.created_at - by;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write(&self, kind: ArtifactKind, key: &CacheKey, bytes: &[u8]) -> Result<EntryMetadata> {
        let metadata = EntryMetadata {
            key: key.clone(),
            kind,
            created_at: Utc::now(),
            size_bytes: bytes.len() as u64,
        };
        let blob = StoredBlob {
            metadata: metadata.clone(),
            bytes: bytes.to_vec(),
        };
        self.entries
            .write()
            .map_err(|_| CoreError::LockPoisoned)?
            .insert((kind, key.clone()), blob);
        Ok(metadata)
    }

    fn read(&self, kind: ArtifactKind, key: &CacheKey) -> Result<Option<StoredBlob>> {
        let entries = self.entries.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(entries.get(&(kind, key.clone())).cloned())
    }

    fn remove(&self, kind: ArtifactKind, key: &CacheKey) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(entries.remove(&(kind, key.clone())).is_some())
    }

    fn list(&self) -> Result<Vec<EntryMetadata>> {
        let entries = self.entries.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(entries.values().map(|b| b.metadata.clone()).collect())
    }

    fn clear(&self, kind: Option<ArtifactKind>) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| CoreError::LockPoisoned)?;
        let before = entries.len();
        match kind {
            Some(kind) => entries.retain(|(k, _), _| *k != kind),
            None => entries.clear(),
        }
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::CacheParams;

    #[test]
    fn test_write_read_remove() {
        let backend = MemoryBackend::new();
        let key = CacheKey::derive(ArtifactKind::Grid, &CacheParams::new());
        let meta = backend.write(ArtifactKind::Grid, &key, b"abc").unwrap();
        assert_eq!(meta.size_bytes, 3);

        let blob = backend.read(ArtifactKind::Grid, &key).unwrap().unwrap();
        assert_eq!(blob.bytes, b"abc");
        // same key under another kind is a different entry
        assert!(backend.read(ArtifactKind::Boundary, &key).unwrap().is_none());

        assert!(backend.remove(ArtifactKind::Grid, &key).unwrap());
        assert!(!backend.remove(ArtifactKind::Grid, &key).unwrap());
    }

    #[test]
    fn test_backdate_and_scoped_clear() {
        let backend = MemoryBackend::new();
        let grid = CacheKey::derive(ArtifactKind::Grid, &CacheParams::new());
        let boundary = CacheKey::derive(ArtifactKind::Boundary, &CacheParams::new());
        backend.write(ArtifactKind::Grid, &grid, b"g").unwrap();
        backend.write(ArtifactKind::Boundary, &boundary, b"b").unwrap();

        let before = backend.read(ArtifactKind::Grid, &grid).unwrap().unwrap().metadata.created_at;
        assert!(backend.backdate(ArtifactKind::Grid, &grid, Duration::from_secs(60)).unwrap());
        let after = backend.read(ArtifactKind::Grid, &grid).unwrap().unwrap().metadata.created_at;
        assert_eq!((before - after).num_seconds(), 60);

        assert_eq!(backend.clear(Some(ArtifactKind::Grid)).unwrap(), 1);
        assert_eq!(backend.list().unwrap().len(), 1);
        assert_eq!(backend.clear(None).unwrap(), 1);
    }
}
