//! Land cover vs. temperature correlation

use crate::stats::{self, Association, TemperatureSummary};
use heatsense_core::model::{
    AnalysisGrid, GridCell, LandCoverCategory, LandCoverPolygon, AREA_EPSILON,
};
use heatsense_core::LogContext;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Land cover assigned to one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellLandCover {
    pub cell_id: u32,
    pub category: LandCoverCategory,
    /// Area-weighted imperviousness of every intersecting polygon
    pub imperviousness: f64,
}

/// How far a category runs hotter or cooler than the study area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalDeviation {
    /// Category mean minus overall mean, in °C
    pub mean_difference: f64,
    /// Difference in units of the overall std, capped to [-1, 1]
    pub standardized: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: LandCoverCategory,
    pub temperature: TemperatureSummary,
    pub mean_imperviousness: f64,
    pub association: Association,
    pub deviation: Option<ThermalDeviation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub overall: TemperatureSummary,
    pub mean_imperviousness: Option<f64>,
    /// Temperature vs. imperviousness across all cells
    pub association: Association,
    /// Ordered by category
    pub categories: Vec<CategoryStats>,
    /// Cells with a temperature classified as unknown
    pub unmatched_cells: usize,
}

impl CorrelationResult {
    pub fn category(&self, category: LandCoverCategory) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Categories sorted from hottest to coolest mean
    pub fn ranked(&self) -> Vec<&CategoryStats> {
        let mut ranked: Vec<&CategoryStats> = self
            .categories
            .iter()
            .filter(|c| c.temperature.mean.is_some())
            .collect();
        ranked.sort_by(|a, b| {
            let a = a.temperature.mean.unwrap_or(f64::NEG_INFINITY);
            let b = b.temperature.mean.unwrap_or(f64::NEG_INFINITY);
            b.total_cmp(&a)
        });
        ranked
    }
}

/// Polygons bucketed by the grid cells their bounding boxes cover
struct PolygonIndex<'a> {
    polygons: &'a [LandCoverPolygon],
    buckets: HashMap<(u32, u32), Vec<usize>>,
}

impl<'a> PolygonIndex<'a> {
    fn new(grid: &AnalysisGrid, polygons: &'a [LandCoverPolygon]) -> Self {
        let mut buckets: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        let (rows, cols) = grid.dimensions();
        if rows == 0 || cols == 0 {
            return Self { polygons, buckets };
        }

        let res = grid.resolution;
        let origin = grid.bounds;
        let to_index = |offset: f64, max: u32| -> u32 {
            (offset / res).floor().clamp(0.0, (max - 1) as f64) as u32
        };

        for (i, lc) in polygons.iter().enumerate() {
            let bbox = lc.geometry.bounding_box();
            if !bbox.intersects(&origin) {
                continue;
            }
            let (c0, c1) = (to_index(bbox.min_x - origin.min_x, cols), to_index(bbox.max_x - origin.min_x, cols));
            let (r0, r1) = (to_index(bbox.min_y - origin.min_y, rows), to_index(bbox.max_y - origin.min_y, rows));
            for row in r0..=r1 {
                for col in c0..=c1 {
                    buckets.entry((row, col)).or_default().push(i);
                }
            }
        }
        Self { polygons, buckets }
    }

    /// (polygon, intersection area) pairs in polygon order
    fn overlaps(&self, cell: &GridCell) -> Vec<(&'a LandCoverPolygon, f64)> {
        let Some(candidates) = self.buckets.get(&(cell.row, cell.col)) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter_map(|&i| {
                let lc = &self.polygons[i];
                // Cut to the cell's square first, then against the part of it
                // inside the study area
                let area = lc
                    .geometry
                    .clip_to_rect(&cell.extent)
                    .intersection_area(&cell.geometry);
                (area > AREA_EPSILON).then_some((lc, area))
            })
            .collect()
    }
}

/// Assign a category and imperviousness to a cell
///
/// The category is that of the polygon with the largest overlap; the first
/// polygon wins ties. Cells without overlap are unknown.
fn classify(cell: &GridCell, overlaps: &[(&LandCoverPolygon, f64)]) -> CellLandCover {
    let mut best: Option<(&LandCoverPolygon, f64)> = None;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for &(lc, area) in overlaps {
        weighted += lc.imperviousness() * area;
        total += area;
        if best.map_or(true, |(_, a)| area > a) {
            best = Some((lc, area));
        }
    }

    match best {
        Some((lc, _)) => CellLandCover {
            cell_id: cell.id,
            category: lc.category,
            imperviousness: weighted / total,
        },
        None => CellLandCover {
            cell_id: cell.id,
            category: LandCoverCategory::Unknown,
            imperviousness: LandCoverCategory::Unknown.imperviousness(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    significance_level: f64,
    log: LogContext,
}

impl CorrelationAnalyzer {
    pub fn new(significance_level: f64, log: &LogContext) -> Self {
        Self {
            significance_level,
            log: log.child("correlation"),
        }
    }

    /// Land cover of every cell with a valid temperature
    pub fn assign(&self, grid: &AnalysisGrid, landcover: &[LandCoverPolygon]) -> Vec<CellLandCover> {
        let index = PolygonIndex::new(grid, landcover);
        grid.cells
            .iter()
            .filter(|c| c.valid_temperature().is_some())
            .map(|cell| classify(cell, &index.overlaps(cell)))
            .collect()
    }

    pub fn correlate(&self, grid: &AnalysisGrid, landcover: &[LandCoverPolygon]) -> CorrelationResult {
        self.log.in_scope(|| {
            let assignments = self.assign(grid, landcover);
            let unmatched_cells = assignments
                .iter()
                .filter(|a| a.category == LandCoverCategory::Unknown)
                .count();

            let mut temps = Vec::with_capacity(assignments.len());
            let mut imps = Vec::with_capacity(assignments.len());
            let mut by_category: BTreeMap<LandCoverCategory, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
            for a in &assignments {
                let Some(t) = grid.cell(a.cell_id).and_then(GridCell::valid_temperature) else {
                    continue;
                };
                temps.push(t);
                imps.push(a.imperviousness);
                let entry = by_category.entry(a.category).or_default();
                entry.0.push(t);
                entry.1.push(a.imperviousness);
            }

            let overall = TemperatureSummary::from_values(&temps);
            let categories = by_category
                .into_iter()
                .map(|(category, (t, i))| {
                    let temperature = TemperatureSummary::from_values(&t);
                    debug!(%category, cells = t.len(), "category summarized");
                    CategoryStats {
                        category,
                        temperature,
                        mean_imperviousness: stats::mean(&i).unwrap_or(0.0),
                        association: stats::pearson(&i, &t, self.significance_level),
                        deviation: deviation(&temperature, &overall),
                    }
                })
                .collect::<Vec<_>>();

            let association = stats::pearson(&imps, &temps, self.significance_level);
            info!(
                cells = temps.len(),
                categories = categories.len(),
                unmatched_cells,
                r = association.r,
                p = association.p_value,
                "correlation finished"
            );

            CorrelationResult {
                overall,
                mean_imperviousness: stats::mean(&imps),
                association,
                categories,
                unmatched_cells,
            }
        })
    }
}

fn deviation(category: &TemperatureSummary, overall: &TemperatureSummary) -> Option<ThermalDeviation> {
    let difference = category.mean? - overall.mean?;
    let standardized = match overall.std {
        Some(std) if std > 0.0 => (difference / std).clamp(-1.0, 1.0),
        _ => 0.0,
    };
    Some(ThermalDeviation {
        mean_difference: difference,
        standardized,
    })
}
