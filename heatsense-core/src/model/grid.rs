//! Analysis grid

use crate::model::geometry::{BoundingBox, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// One square cell of the analysis grid, clipped to the study boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Ordinal id, equal to the cell's index in [`AnalysisGrid::cells`]
    pub id: u32,
    /// Row index counted from the southern edge of the grid bounds
    pub row: u32,
    /// Column index counted from the western edge of the grid bounds
    pub col: u32,
    /// Unclipped square extent
    pub extent: BoundingBox,
    /// Cell geometry after clipping to the boundary
    pub geometry: MultiPolygon,
    /// Mean land surface temperature in °C
    pub temperature: Option<f64>,
}

impl GridCell {
    pub fn centroid(&self) -> Point {
        self.geometry
            .centroid()
            .unwrap_or_else(|| self.extent.center())
    }

    pub fn area(&self) -> f64 {
        self.geometry.area()
    }

    /// Temperature if present and finite
    pub fn valid_temperature(&self) -> Option<f64> {
        self.temperature.filter(|t| t.is_finite())
    }
}

/// Ordered cells partitioning a study area at a fixed resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisGrid {
    /// Side length of a cell in metres
    pub resolution: f64,
    /// Bounding box the grid was tiled over
    pub bounds: BoundingBox,
    pub cells: Vec<GridCell>,
}

impl AnalysisGrid {
    pub fn empty(resolution: f64) -> Self {
        Self {
            resolution,
            bounds: BoundingBox::empty(),
            cells: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: u32) -> Option<&GridCell> {
        self.cells.get(id as usize)
    }

    /// `(cell id, temperature)` for every cell with a finite temperature
    pub fn valid_temperatures(&self) -> Vec<(u32, f64)> {
        self.cells
            .iter()
            .filter_map(|c| c.valid_temperature().map(|t| (c.id, t)))
            .collect()
    }

    /// Copy of this grid with per-cell temperatures attached
    ///
    /// `temperatures` is indexed by cell id; missing trailing values are
    /// treated as absent.
    pub fn with_temperatures(&self, temperatures: &[Option<f64>]) -> AnalysisGrid {
        let mut grid = self.clone();
        for cell in &mut grid.cells {
            cell.temperature = temperatures.get(cell.id as usize).copied().flatten();
        }
        grid
    }

    /// Number of rows and columns the bounds were tiled into
    pub fn dimensions(&self) -> (u32, u32) {
        self.cells.iter().fold((0, 0), |(rows, cols), c| {
            (rows.max(c.row + 1), cols.max(c.col + 1))
        })
    }
}
