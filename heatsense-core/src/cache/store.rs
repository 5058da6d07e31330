//! Artifact cache with age- and size-bounded eviction

use crate::cache::{
    artifact::Artifact,
    backend::{CacheBackend, FileSystemBackend, MemoryBackend},
    config::CacheConfig,
    entry::{CacheEntry, EntryMetadata},
    eviction::{EvictionReason, EvictionReport, MaintenanceReport},
    key::{CacheKey, CacheParams},
    types::{ArtifactKind, CacheStats, KindStats},
};
use crate::error::Result;
use crate::logging::LogContext;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn, Instrument};

/// Content-addressed cache for intermediate analysis artifacts
///
/// - Keys are derived from the artifact kind and a parameter map
/// - Lookups treat absent, expired and corrupt entries alike: as misses
/// - Writes are fail-open: a failed write is logged, never raised
/// - Eviction and clear hold the maintenance gate exclusively, so they never
///   interleave with an in-flight put or get
pub struct ArtifactCache {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    /// Session counters; content fields are filled by [`ArtifactCache::stats`]
    counters: RwLock<CacheStats>,
    gate: RwLock<()>,
    log: LogContext,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ArtifactCache {
    /// Open the on-disk cache described by `config`
    pub fn open(config: CacheConfig, log: &LogContext) -> Result<Self> {
        config.validate()?;
        let backend = FileSystemBackend::new(&config.cache_dir)?;
        Ok(Self::with_backend(config, Arc::new(backend), log))
    }

    /// Cache backed by process memory
    pub fn in_memory(config: CacheConfig, log: &LogContext) -> Self {
        Self::with_backend(config, Arc::new(MemoryBackend::new()), log)
    }

    pub fn with_backend(config: CacheConfig, backend: Arc<dyn CacheBackend>, log: &LogContext) -> Self {
        let log = log.child("cache");
        log.in_scope(|| {
            info!(
                backend = backend.name(),
                max_age_days = config.max_age_days(),
                max_size_bytes = config.max_size_bytes,
                "initializing artifact cache"
            )
        });

        Self {
            config,
            backend,
            counters: RwLock::new(CacheStats::default()),
            gate: RwLock::new(()),
            log,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Store an artifact; returns its key even when the write fails
    pub async fn put(&self, params: &CacheParams, artifact: &Artifact) -> CacheKey {
        let kind = artifact.kind();
        let key = CacheKey::derive(kind, params);

        async {
            let bytes = match artifact.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(%kind, key = key.short(), error = %e, "failed to encode artifact, not cached");
                    self.counters.write().await.failed_writes += 1;
                    return;
                }
            };

            let _gate = self.gate.read().await;
            let write_key = key.clone();
            let result = self
                .blocking(move |backend| backend.write(kind, &write_key, &bytes))
                .await;

            match result {
                Ok(meta) => {
                    debug!(%kind, key = key.short(), size_bytes = meta.size_bytes, "cached artifact");
                    self.counters.write().await.writes += 1;
                }
                Err(e) => {
                    warn!(%kind, key = key.short(), error = %e, "cache write failed");
                    self.counters.write().await.failed_writes += 1;
                }
            }
        }
        .instrument(self.log.span().clone())
        .await;

        key
    }

    /// Look up an artifact
    pub async fn get(&self, kind: ArtifactKind, params: &CacheParams) -> Option<Artifact> {
        self.get_entry(kind, params).await.map(CacheEntry::into_payload)
    }

    /// Look up an artifact together with its metadata
    pub async fn get_entry(&self, kind: ArtifactKind, params: &CacheParams) -> Option<CacheEntry> {
        let key = CacheKey::derive(kind, params);
        self.lookup(kind, key)
            .instrument(self.log.span().clone())
            .await
    }

    async fn lookup(&self, kind: ArtifactKind, key: CacheKey) -> Option<CacheEntry> {
        let max_age = self.config.max_age;
        let read_key = key.clone();

        let outcome = {
            let _gate = self.gate.read().await;
            self.blocking(move |backend| {
                let Some(blob) = backend.read(kind, &read_key)? else {
                    return Ok(Lookup::Absent);
                };
                if blob.metadata.is_expired(max_age, Utc::now()) {
                    return Ok(Lookup::Expired(blob.metadata));
                }
                Ok(match Artifact::decode(kind, &blob.bytes) {
                    Ok(payload) => Lookup::Found(CacheEntry {
                        metadata: blob.metadata,
                        payload,
                    }),
                    Err(e) => Lookup::Corrupt(e.to_string()),
                })
            })
            .await
        };

        let found = match outcome {
            Ok(Lookup::Found(entry)) => {
                debug!(%kind, key = key.short(), "cache hit");
                Some(entry)
            }
            Ok(Lookup::Absent) => {
                debug!(%kind, key = key.short(), "cache miss");
                None
            }
            Ok(Lookup::Expired(meta)) => {
                debug!(
                    %kind,
                    key = key.short(),
                    age_secs = meta.age(Utc::now()).as_secs(),
                    "cache entry expired"
                );
                None
            }
            Ok(Lookup::Corrupt(reason)) => {
                warn!(%kind, key = key.short(), %reason, "corrupt cache entry, treating as miss");
                self.discard_corrupt(kind, &key).await;
                None
            }
            Err(e) => {
                warn!(%kind, key = key.short(), error = %e, "cache read failed, treating as miss");
                None
            }
        };

        let mut counters = self.counters.write().await;
        if found.is_some() {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
        found
    }

    /// Remove an entry that failed to decode, unless a concurrent put has
    /// replaced it with a readable one in the meantime
    async fn discard_corrupt(&self, kind: ArtifactKind, key: &CacheKey) {
        let _gate = self.gate.write().await;
        let key = key.clone();
        let result = self
            .blocking(move |backend| match backend.read(kind, &key)? {
                Some(blob) if Artifact::decode(kind, &blob.bytes).is_err() => backend.remove(kind, &key),
                _ => Ok(false),
            })
            .await;
        if let Err(e) = result {
            warn!(%kind, error = %e, "failed to remove corrupt cache entry");
        }
    }

    /// Remove every entry whose age reached the max age
    pub async fn evict_expired(&self) -> Result<EvictionReport> {
        let max_age = self.config.max_age;
        async {
            let _gate = self.gate.write().await;
            let removed = self
                .blocking(move |backend| {
                    let now = Utc::now();
                    let mut removed = Vec::new();
                    for meta in backend.list()? {
                        if meta.is_expired(max_age, now) && backend.remove(meta.kind, &meta.key)? {
                            removed.push(meta);
                        }
                    }
                    Ok(removed)
                })
                .await?;

            let report = EvictionReport::new(EvictionReason::Expired, removed);
            if !report.is_empty() {
                self.counters.write().await.evictions_expired += report.len() as u64;
                info!("evicted expired entries: {}", report);
            }
            Ok(report)
        }
        .instrument(self.log.span().clone())
        .await
    }

    /// Remove entries oldest-first until the total size is at most `max_bytes`
    ///
    /// Entries with identical timestamps are removed in key order.
    pub async fn enforce_size_budget(&self, max_bytes: u64) -> Result<EvictionReport> {
        async {
            let _gate = self.gate.write().await;
            let removed = self
                .blocking(move |backend| {
                    let mut entries = backend.list()?;
                    let mut total: u64 = entries.iter().map(|e| e.size_bytes).sum();
                    if total <= max_bytes {
                        return Ok(Vec::new());
                    }

                    entries.sort_by(|a, b| {
                        a.created_at
                            .cmp(&b.created_at)
                            .then_with(|| a.key.cmp(&b.key))
                    });

                    let mut removed = Vec::new();
                    for meta in entries {
                        if total <= max_bytes {
                            break;
                        }
                        if backend.remove(meta.kind, &meta.key)? {
                            total = total.saturating_sub(meta.size_bytes);
                            removed.push(meta);
                        }
                    }
                    Ok(removed)
                })
                .await?;

            let report = EvictionReport::new(EvictionReason::SizeBudget, removed);
            if !report.is_empty() {
                self.counters.write().await.evictions_size += report.len() as u64;
                info!(max_bytes, "enforced size budget: {}", report);
            }
            Ok(report)
        }
        .instrument(self.log.span().clone())
        .await
    }

    /// Remove all entries, or only those of one kind
    pub async fn clear(&self, kind: Option<ArtifactKind>) -> Result<EvictionReport> {
        async {
            let _gate = self.gate.write().await;
            let removed = self
                .blocking(move |backend| {
                    let entries: Vec<EntryMetadata> = backend
                        .list()?
                        .into_iter()
                        .filter(|e| kind.map_or(true, |k| e.kind == k))
                        .collect();
                    backend.clear(kind)?;
                    Ok(entries)
                })
                .await?;

            let report = EvictionReport::new(EvictionReason::Cleared, removed).with_scope(kind);
            match kind {
                Some(kind) => info!(%kind, "cleared cache: {}", report),
                None => info!("cleared cache: {}", report),
            }
            Ok(report)
        }
        .instrument(self.log.span().clone())
        .await
    }

    /// Expiry pass followed by the configured size budget
    pub async fn maintain(&self) -> Result<MaintenanceReport> {
        let expired = self.evict_expired().await?;
        let size_budget = self.enforce_size_budget(self.config.max_size_bytes).await?;
        Ok(MaintenanceReport {
            expired,
            size_budget,
        })
    }

    /// Current contents plus session counters
    ///
    /// A backend failure is logged and reported as an empty cache.
    pub async fn stats(&self) -> CacheStats {
        let listed = {
            let _gate = self.gate.read().await;
            self.blocking(|backend| backend.list()).await
        };

        let mut stats = self.counters.read().await.clone();
        match listed {
            Ok(entries) => {
                for entry in entries {
                    stats.entries += 1;
                    stats.size_bytes += entry.size_bytes;
                    let kind_stats = stats.by_kind.entry(entry.kind).or_insert_with(KindStats::default);
                    kind_stats.entries += 1;
                    kind_stats.size_bytes += entry.size_bytes;
                }
            }
            Err(e) => {
                self.log
                    .in_scope(|| warn!(error = %e, "failed to list cache entries"));
            }
        }
        stats
    }

    /// Run a backend call on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn CacheBackend) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || f(backend.as_ref())).await?
    }
}

enum Lookup {
    Found(CacheEntry),
    Absent,
    Expired(EntryMetadata),
    Corrupt(String),
}
