use criterion::{criterion_group, criterion_main, Criterion};
use heatsense_core::cache::{Artifact, ArtifactCache, ArtifactKind, CacheConfig, CacheKey, CacheParams};
use heatsense_core::model::{AnalysisGrid, BoundingBox, DateRange, GridCell};
use heatsense_core::LogContext;
use std::hint::black_box;

fn temperature_params() -> CacheParams {
    CacheParams::new()
        .with("bbox", BoundingBox::new(300_000.0, 5_600_000.0, 320_000.0, 5_620_000.0))
        .with(
            "date_range",
            DateRange::parse("2023-06-01", "2023-08-31").expect("valid range"),
        )
        .with("resolution", 100.0)
        .with("cloud_threshold", 20.0)
        .with("area", "Leipzig")
}

fn sample_grid(side: u32) -> AnalysisGrid {
    let mut cells = Vec::new();
    for row in 0..side {
        for col in 0..side {
            let extent = BoundingBox::new(
                col as f64 * 100.0,
                row as f64 * 100.0,
                (col + 1) as f64 * 100.0,
                (row + 1) as f64 * 100.0,
            );
            cells.push(GridCell {
                id: row * side + col,
                row,
                col,
                extent,
                geometry: extent.to_polygon().into(),
                temperature: Some(20.0 + (row + col) as f64 * 0.1),
            });
        }
    }
    AnalysisGrid {
        resolution: 100.0,
        bounds: BoundingBox::new(0.0, 0.0, side as f64 * 100.0, side as f64 * 100.0),
        cells,
    }
}

fn bench_key_derivation(c: &mut Criterion) {
    let params = temperature_params();
    c.bench_function("cache/derive_key", |b| {
        b.iter(|| black_box(CacheKey::derive(ArtifactKind::Temperature, black_box(&params))))
    });
}

fn bench_grid_encoding(c: &mut Criterion) {
    let artifact = Artifact::Temperature(sample_grid(50));
    let bytes = artifact.encode().expect("encode grid");

    c.bench_function("cache/encode_grid_2500", |b| {
        b.iter(|| black_box(artifact.encode().expect("encode grid")))
    });
    c.bench_function("cache/decode_grid_2500", |b| {
        b.iter(|| black_box(Artifact::decode(ArtifactKind::Temperature, black_box(&bytes))))
    });
}

fn bench_memory_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let cache = ArtifactCache::in_memory(CacheConfig::default(), &LogContext::disabled());
    let params = temperature_params();
    let artifact = Artifact::Temperature(sample_grid(20));

    c.bench_function("cache/memory_put_get_400", |b| {
        b.to_async(&runtime).iter(|| async {
            cache.put(&params, &artifact).await;
            black_box(cache.get(ArtifactKind::Temperature, &params).await)
        })
    });
}

criterion_group!(
    benches,
    bench_key_derivation,
    bench_grid_encoding,
    bench_memory_round_trip
);
criterion_main!(benches);
