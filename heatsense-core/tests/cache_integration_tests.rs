//! Integration tests for the artifact cache on the filesystem backend
//!
//! These tests verify:
//! - Put/get transparency and expiry
//! - Corrupt entries behaving as misses
//! - Size-budget eviction bound and oldest-first order
//! - Kind-scoped clearing and statistics
//! - Concurrent writers to the same key

use heatsense_core::cache::{
    Artifact, ArtifactCache, ArtifactKind, CacheConfig, CacheKey, CacheParams, FileSystemBackend,
};
use heatsense_core::model::{
    AnalysisGrid, Boundary, BoundingBox, CollectionMetadata, DateRange, GridCell, LandCoverCategory,
    LandCoverPolygon,
};
use heatsense_core::LogContext;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn open_cache(dir: &std::path::Path, max_age: Duration) -> ArtifactCache {
    let config = CacheConfig::builder()
        .cache_dir(dir)
        .max_age(max_age)
        .max_size_bytes(10 * 1024 * 1024)
        .build();
    ArtifactCache::open(config, &LogContext::disabled()).unwrap()
}

fn grid(temps: &[Option<f64>]) -> AnalysisGrid {
    let cells = temps
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let extent = BoundingBox::new(i as f64 * 10.0, 0.0, (i + 1) as f64 * 10.0, 10.0);
            GridCell {
                id: i as u32,
                row: 0,
                col: i as u32,
                extent,
                geometry: extent.to_polygon().into(),
                temperature: *t,
            }
        })
        .collect();
    AnalysisGrid {
        resolution: 10.0,
        bounds: BoundingBox::new(0.0, 0.0, temps.len() as f64 * 10.0, 10.0),
        cells,
    }
}

fn params(i: i64) -> CacheParams {
    CacheParams::new()
        .with("bbox", BoundingBox::new(0.0, 0.0, 100.0, 100.0))
        .with("resolution", 10.0)
        .with("run", i)
}

fn set_age(path: &std::path::Path, age: Duration) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[tokio::test]
async fn test_get_after_put_returns_equal_payload() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(dir.path(), Duration::from_secs(3600));

    let temperature = Artifact::Temperature(grid(&[Some(21.5), None, Some(30.125)]));
    let landcover = Artifact::LandCover(vec![LandCoverPolygon::from_corine(
        112,
        BoundingBox::new(0.0, 0.0, 5.0, 5.0).to_polygon().into(),
    )]);
    let metadata = Artifact::CollectionMetadata(CollectionMetadata {
        image_id: "composite".to_string(),
        scene_count: 4,
        bounds: BoundingBox::new(0.0, 0.0, 100.0, 100.0),
        date_range: DateRange::parse("2023-06-01", "2023-08-31").unwrap(),
        cloud_threshold: 20.0,
        acquired_at: chrono::Utc::now(),
    });

    for artifact in [&temperature, &landcover, &metadata] {
        cache.put(&params(1), artifact).await;
        let found = cache.get(artifact.kind(), &params(1)).await;
        assert_eq!(found.as_ref(), Some(artifact));
    }

    let landcover = cache
        .get(ArtifactKind::LandCover, &params(1))
        .await
        .unwrap()
        .into_landcover()
        .unwrap();
    assert_eq!(landcover[0].category, LandCoverCategory::Residential);
}

#[tokio::test]
async fn test_entry_expires_after_max_age() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(dir.path(), Duration::from_millis(200));

    cache.put(&params(1), &Artifact::Grid(grid(&[None, None]))).await;
    assert!(cache.get(ArtifactKind::Grid, &params(1)).await.is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(cache.get(ArtifactKind::Grid, &params(1)).await.is_none());
    let report = cache.evict_expired().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn test_truncated_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(dir.path(), Duration::from_secs(3600));
    let backend = FileSystemBackend::new(dir.path()).unwrap();

    let key = cache.put(&params(7), &Artifact::Grid(grid(&[Some(1.0); 8]))).await;
    let path = backend.entry_path(ArtifactKind::Grid, &key);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 3]).unwrap();

    assert!(cache.get(ArtifactKind::Grid, &params(7)).await.is_none());
    assert!(!path.exists());

    // the next write-through repairs the entry
    cache.put(&params(7), &Artifact::Grid(grid(&[Some(1.0); 8]))).await;
    assert!(cache.get(ArtifactKind::Grid, &params(7)).await.is_some());
}

#[tokio::test]
async fn test_size_budget_bound_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(dir.path(), Duration::from_secs(30 * 24 * 3600));
    let backend = FileSystemBackend::new(dir.path()).unwrap();

    let mut keys = Vec::new();
    for i in 0..5 {
        let artifact = Artifact::Grid(grid(&vec![Some(i as f64); (i + 1) as usize]));
        let key = cache.put(&params(i), &artifact).await;
        // entry i is (5 - i) hours old
        set_age(
            &backend.entry_path(ArtifactKind::Grid, &key),
            Duration::from_secs((5 - i as u64) * 3600),
        );
        keys.push(key);
    }

    let before = cache.stats().await;
    let budget = before.size_bytes / 2;
    let report = cache.enforce_size_budget(budget).await.unwrap();
    let after = cache.stats().await;

    assert!(after.size_bytes <= budget);
    assert!(!report.is_empty());
    let removed: Vec<&CacheKey> = report.keys().collect();
    let expected: Vec<&CacheKey> = keys.iter().take(removed.len()).collect();
    assert_eq!(removed, expected, "oldest entries must go first");
    assert_eq!(after.evictions_size, report.len() as u64);
}

#[tokio::test]
async fn test_clear_scoped_to_kind() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(dir.path(), Duration::from_secs(3600));

    cache.put(&params(1), &Artifact::Grid(grid(&[None]))).await;
    cache.put(&params(1), &Artifact::Temperature(grid(&[Some(3.0)]))).await;
    cache
        .put(
            &params(1),
            &Artifact::Boundary(Boundary::new("b", BoundingBox::new(0.0, 0.0, 1.0, 1.0).to_polygon().into())),
        )
        .await;

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.by_kind.len(), 3);

    cache.clear(Some(ArtifactKind::Temperature)).await.unwrap();
    assert!(cache.get(ArtifactKind::Temperature, &params(1)).await.is_none());
    assert!(cache.get(ArtifactKind::Grid, &params(1)).await.is_some());

    let report = cache.clear(None).await.unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn test_concurrent_writers_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(open_cache(dir.path(), Duration::from_secs(3600)));
    let artifact = Artifact::Grid(grid(&[Some(1.0), Some(2.0)]));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let artifact = artifact.clone();
            tokio::spawn(async move { cache.put(&params(42), &artifact).await })
        })
        .collect();
    let keys: Vec<CacheKey> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(keys.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.get(ArtifactKind::Grid, &params(42)).await, Some(artifact));
    assert_eq!(cache.stats().await.entries, 1);
}

#[tokio::test]
async fn test_maintain_runs_expiry_then_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig::builder()
        .cache_dir(dir.path())
        .max_age(Duration::from_secs(3600))
        .max_size_bytes(1)
        .build();
    let cache = ArtifactCache::open(config, &LogContext::disabled()).unwrap();
    let backend = FileSystemBackend::new(dir.path()).unwrap();

    let old = cache.put(&params(1), &Artifact::Grid(grid(&[None]))).await;
    set_age(&backend.entry_path(ArtifactKind::Grid, &old), Duration::from_secs(7200));
    cache.put(&params(2), &Artifact::Grid(grid(&[None]))).await;

    let report = cache.maintain().await.unwrap();
    assert_eq!(report.expired.len(), 1);
    assert_eq!(report.size_budget.len(), 1);
    assert_eq!(report.total_removed(), 2);
}
