use crate::cache::backend::CacheBackend;
use crate::cache::entry::{EntryMetadata, StoredBlob};
use crate::cache::key::CacheKey;
use crate::cache::types::ArtifactKind;
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One subdirectory per artifact kind, one `<key>.<ext>` file per entry
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so readers never see a half-written entry. The entry
/// timestamp is the file's modification time.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
}

impl FileSystemBackend {
    /// Open a cache rooted at `root`, creating the kind directories
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in ArtifactKind::ALL {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        debug!(root = %root.display(), "opened filesystem cache backend");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Path of the file holding an entry
    pub fn entry_path(&self, kind: ArtifactKind, key: &CacheKey) -> PathBuf {
        self.kind_dir(kind)
            .join(format!("{}.{}", key.as_str(), kind.extension()))
    }

    fn metadata_for(kind: ArtifactKind, key: CacheKey, meta: &fs::Metadata) -> Result<EntryMetadata> {
        Ok(EntryMetadata {
            key,
            kind,
            created_at: DateTime::<Utc>::from(meta.modified()?),
            size_bytes: meta.len(),
        })
    }

    fn list_kind(&self, kind: ArtifactKind) -> Result<Vec<(EntryMetadata, PathBuf)>> {
        let dir = self.kind_dir(kind);
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(kind.extension()) {
                continue;
            }
            // Temp files and foreign files have no valid key stem
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| CacheKey::from_hex(s).ok())
            else {
                continue;
            };
            // The file may vanish between read_dir and stat
            let Ok(meta) = dir_entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            entries.push((Self::metadata_for(kind, key, &meta)?, path));
        }
        Ok(entries)
    }
}

impl CacheBackend for FileSystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn write(&self, kind: ArtifactKind, key: &CacheKey, bytes: &[u8]) -> Result<EntryMetadata> {
        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        let path = self.entry_path(kind, key);
        let file = tmp.persist(&path).map_err(|e| CoreError::Io(e.error))?;
        let meta = file.metadata()?;
        Self::metadata_for(kind, key.clone(), &meta)
    }

    fn read(&self, kind: ArtifactKind, key: &CacheKey) -> Result<Option<StoredBlob>> {
        let path = self.entry_path(kind, key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredBlob {
            metadata: Self::metadata_for(kind, key.clone(), &meta)?,
            bytes,
        }))
    }

    fn remove(&self, kind: ArtifactKind, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.entry_path(kind, key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<EntryMetadata>> {
        let mut all = Vec::new();
        for kind in ArtifactKind::ALL {
            all.extend(self.list_kind(kind)?.into_iter().map(|(meta, _)| meta));
        }
        Ok(all)
    }

    fn clear(&self, kind: Option<ArtifactKind>) -> Result<usize> {
        let kinds: Vec<ArtifactKind> = match kind {
            Some(kind) => vec![kind],
            None => ArtifactKind::ALL.to_vec(),
        };

        let mut removed = 0;
        for kind in kinds {
            for (_, path) in self.list_kind(kind)? {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::CacheParams;

    fn key(n: i64) -> CacheKey {
        CacheKey::derive(ArtifactKind::Grid, &CacheParams::new().with("n", n))
    }

    #[test]
    fn test_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).unwrap();
        for kind in ArtifactKind::ALL {
            assert!(dir.path().join(kind.dir_name()).is_dir());
        }

        let k = key(1);
        backend.write(ArtifactKind::CollectionMetadata, &k, b"\x01\x02").unwrap();
        let expected = dir
            .path()
            .join("collection-metadata")
            .join(format!("{}.bin", k.as_str()));
        assert!(expected.is_file());
    }

    #[test]
    fn test_write_read_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).unwrap();
        let k = key(2);

        assert!(backend.read(ArtifactKind::Grid, &k).unwrap().is_none());
        backend.write(ArtifactKind::Grid, &k, b"first").unwrap();
        let meta = backend.write(ArtifactKind::Grid, &k, b"second!").unwrap();
        assert_eq!(meta.size_bytes, 7);

        let blob = backend.read(ArtifactKind::Grid, &k).unwrap().unwrap();
        assert_eq!(blob.bytes, b"second!");
        assert_eq!(backend.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).unwrap();
        backend.write(ArtifactKind::Grid, &key(3), b"{}").unwrap();
        fs::write(dir.path().join("grid").join("notes.txt"), b"hi").unwrap();
        fs::write(dir.path().join("grid").join("short.geojson"), b"{}").unwrap();

        let listed = backend.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, key(3));
    }

    #[test]
    fn test_clear_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).unwrap();
        backend.write(ArtifactKind::Grid, &key(4), b"g").unwrap();
        backend.write(ArtifactKind::Boundary, &key(5), b"b").unwrap();

        assert_eq!(backend.clear(Some(ArtifactKind::Grid)).unwrap(), 1);
        assert!(backend.read(ArtifactKind::Grid, &key(4)).unwrap().is_none());
        assert!(backend.read(ArtifactKind::Boundary, &key(5)).unwrap().is_some());
        assert!(backend.remove(ArtifactKind::Boundary, &key(5)).unwrap());
        assert_eq!(backend.clear(None).unwrap(), 0);
    }
}
