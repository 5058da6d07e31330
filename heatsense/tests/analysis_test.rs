//! Integration tests for the analysis building blocks
//!
//! Covers:
//! - Grid tiling of irregular boundaries
//! - Hotspot clustering with a fixed significance test
//! - Correlation on degenerate inputs

use anyhow::Result;
use heatsense::adjacency::Adjacency;
use heatsense::correlation::CorrelationAnalyzer;
use heatsense::grid::tile_boundary;
use heatsense::hotspot::{HotspotDetector, HotspotParams, LocalMoran, LocalStatistic, SignificanceTest};
use heatsense::stats::Association;
use heatsense_core::model::{
    AnalysisGrid, Boundary, BoundingBox, LandCoverCategory, LandCoverPolygon, MultiPolygon, Point,
    Polygon,
};
use heatsense_core::LogContext;
use std::sync::Arc;

/// Significant wherever the value is above the mean
#[derive(Debug)]
struct AboveMean;

impl SignificanceTest for AboveMean {
    fn local_statistics(&self, values: &[f64], _: &[Vec<usize>]) -> Vec<LocalStatistic> {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        values
            .iter()
            .map(|&v| {
                if v > mean {
                    LocalStatistic {
                        local_i: 1.0,
                        p_value: 0.01,
                    }
                } else {
                    LocalStatistic::not_significant()
                }
            })
            .collect()
    }
}

fn l_shape() -> Boundary {
    let polygon = Polygon::new(vec![
        Point::new(0.0, 0.0),
        Point::new(3.0, 0.0),
        Point::new(3.0, 1.0),
        Point::new(1.0, 1.0),
        Point::new(1.0, 3.0),
        Point::new(0.0, 3.0),
    ]);
    Boundary::new("l-shape", MultiPolygon::new(vec![polygon]))
}

fn square_grid(side: f64, resolution: f64, temps: &[f64]) -> AnalysisGrid {
    let boundary = Boundary::new(
        "square",
        BoundingBox::new(0.0, 0.0, side, side).to_polygon().into(),
    );
    let grid = tile_boundary(&boundary, resolution);
    let temps: Vec<Option<f64>> = temps.iter().copied().map(Some).collect();
    grid.with_temperatures(&temps)
}

// ============================================================================
// Grid
// ============================================================================

#[test]
fn test_grid_partitions_irregular_boundary() -> Result<()> {
    let boundary = l_shape();
    let grid = tile_boundary(&boundary, 0.7);

    let covered: f64 = grid.cells.iter().map(|c| c.area()).sum();
    assert!((covered - boundary.area()).abs() < 1e-9);

    for (i, cell) in grid.cells.iter().enumerate() {
        assert_eq!(cell.id, i as u32);
        assert!(cell.area() <= 0.7 * 0.7 + 1e-9);
        assert!(cell.area() > 0.0);
    }

    // 0.7 does not divide 3, so the last row and column overhang
    assert_eq!(grid.dimensions(), (5, 5));
    assert!((grid.bounds.max_x - 3.5).abs() < 1e-9);

    // The notch of the L holds no cells
    assert!(grid.cells.iter().all(|c| c.row < 2 || c.col < 2));

    Ok(())
}

#[test]
fn test_adjacency_of_tiled_grid_is_symmetric() -> Result<()> {
    let grid = tile_boundary(&l_shape(), 1.0);
    assert_eq!(grid.len(), 5);

    let adjacency = Adjacency::queen(&grid);
    for cell in &grid.cells {
        for &n in adjacency.neighbors(cell.id) {
            assert!(adjacency.are_neighbors(n, cell.id));
            assert_ne!(n, cell.id);
        }
    }

    Ok(())
}

// ============================================================================
// Hotspots
// ============================================================================

#[test]
fn test_hot_block_forms_one_cluster() -> Result<()> {
    // 5x5 at 20 °C with a 2x2 block at 40 °C in the south-west corner and
    // one isolated 40 °C cell in the north-east corner
    let mut temps = vec![20.0; 25];
    for id in [0, 1, 5, 6, 24] {
        temps[id] = 40.0;
    }
    let grid = square_grid(5.0, 1.0, &temps);
    let detector = HotspotDetector::new(
        HotspotParams {
            threshold: 0.8,
            significance_level: 0.05,
            min_cluster_size: 3,
        },
        Arc::new(AboveMean),
        &LogContext::disabled(),
    );

    let report = detector.detect(&grid, &Adjacency::queen(&grid));
    assert_eq!(report.candidate_count, 5);
    assert_eq!(report.clusters.len(), 1);
    assert_eq!(report.discarded_clusters, 1);

    let cells: Vec<u32> = report.hotspots.iter().map(|h| h.cell_id).collect();
    assert_eq!(cells, vec![0, 1, 5, 6]);
    assert!(report.hotspots.iter().all(|h| h.cluster_id == report.clusters[0].id));
    assert_eq!(report.clusters[0].size, 4);
    assert_eq!(report.clusters[0].mean_temperature, 40.0);

    Ok(())
}

#[test]
fn test_local_moran_is_reproducible() -> Result<()> {
    let mut temps = vec![20.0; 25];
    for id in [0, 1, 5, 6] {
        temps[id] = 40.0;
    }
    let grid = square_grid(5.0, 1.0, &temps);
    let adjacency = Adjacency::queen(&grid);
    let neighbors: Vec<Vec<usize>> = grid
        .cells
        .iter()
        .map(|c| adjacency.neighbors(c.id).iter().map(|&n| n as usize).collect())
        .collect();

    let test = LocalMoran::new(199, 7);
    let first = test.local_statistics(&temps, &neighbors);
    let second = test.local_statistics(&temps, &neighbors);
    assert_eq!(first, second);
    assert!(first.iter().all(|s| s.p_value > 0.0 && s.p_value <= 1.0));

    // The block interior is positively autocorrelated
    assert!(first[0].local_i > 0.0);

    Ok(())
}

// ============================================================================
// Correlation
// ============================================================================

#[test]
fn test_single_category_has_neutral_association() -> Result<()> {
    let grid = square_grid(2.0, 1.0, &[18.0, 22.0, 25.0, 31.0]);
    let landcover = vec![LandCoverPolygon::with_category(
        LandCoverCategory::Residential,
        BoundingBox::new(0.0, 0.0, 2.0, 2.0).to_polygon().into(),
    )];

    let result = CorrelationAnalyzer::new(0.05, &LogContext::disabled()).correlate(&grid, &landcover);
    // Constant imperviousness leaves nothing to correlate
    assert_eq!(result.association, Association::neutral(4));
    assert_eq!(result.categories.len(), 1);
    assert_eq!(result.categories[0].temperature.count, 4);

    Ok(())
}

#[test]
fn test_uncovered_cells_are_unknown() -> Result<()> {
    let grid = square_grid(2.0, 1.0, &[20.0, 20.0, 20.0, 20.0]);
    let result = CorrelationAnalyzer::new(0.05, &LogContext::disabled()).correlate(&grid, &[]);

    assert_eq!(result.unmatched_cells, 4);
    let unknown = result.category(LandCoverCategory::Unknown).unwrap();
    assert_eq!(unknown.mean_imperviousness, 0.5);
    assert!(!result.association.significant);

    Ok(())
}
