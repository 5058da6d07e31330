//! Analysis grid construction

use crate::error::{PipelineError, Result};
use crate::pipeline::CacheOutcome;
use heatsense_core::model::{AnalysisGrid, Boundary, BoundingBox, GridCell, AREA_EPSILON};
use heatsense_core::{Artifact, ArtifactCache, ArtifactKind, CacheParams, LogContext};
use std::sync::Arc;
use tracing::{debug, info, Instrument};

/// Tile a boundary into square cells of side `resolution`
///
/// Cells are numbered row-major starting at the south-west corner of the
/// boundary's bounding box. A cell is kept only when its intersection with
/// the boundary has area above [`AREA_EPSILON`], so cells touching the
/// boundary along an edge or at a corner are dropped.
pub fn tile_boundary(boundary: &Boundary, resolution: f64) -> AnalysisGrid {
    if boundary.is_empty() || !(resolution.is_finite() && resolution > 0.0) {
        return AnalysisGrid::empty(resolution);
    }

    let bbox = boundary.bounding_box();
    let n_cols = (bbox.width() / resolution).ceil().max(1.0) as u32;
    let n_rows = (bbox.height() / resolution).ceil().max(1.0) as u32;

    let mut cells = Vec::new();
    for row in 0..n_rows {
        let min_y = bbox.min_y + row as f64 * resolution;
        for col in 0..n_cols {
            let min_x = bbox.min_x + col as f64 * resolution;
            let extent = BoundingBox::new(min_x, min_y, min_x + resolution, min_y + resolution);
            let clipped = boundary.geometry.clip_to_rect(&extent);
            if clipped.area() <= AREA_EPSILON {
                continue;
            }
            cells.push(GridCell {
                id: cells.len() as u32,
                row,
                col,
                extent,
                geometry: clipped,
                temperature: None,
            });
        }
    }

    AnalysisGrid {
        resolution,
        bounds: BoundingBox::new(
            bbox.min_x,
            bbox.min_y,
            bbox.min_x + n_cols as f64 * resolution,
            bbox.min_y + n_rows as f64 * resolution,
        ),
        cells,
    }
}

/// Builds analysis grids, reading through the artifact cache
#[derive(Debug, Clone)]
pub struct AnalysisGridBuilder {
    cache: Arc<ArtifactCache>,
    log: LogContext,
}

impl AnalysisGridBuilder {
    pub fn new(cache: Arc<ArtifactCache>, log: &LogContext) -> Self {
        Self {
            cache,
            log: log.child("grid"),
        }
    }

    /// Cache parameters identifying a grid
    pub fn cache_params(boundary: &Boundary, resolution: f64) -> CacheParams {
        CacheParams::new()
            .with("bbox", boundary.bounding_box())
            .with("resolution", resolution)
    }

    /// Grid for `boundary` at `resolution`, from cache when possible
    pub async fn build_or_get(
        &self,
        boundary: &Boundary,
        resolution: f64,
    ) -> Result<(AnalysisGrid, CacheOutcome)> {
        async {
            if boundary.is_empty() {
                info!(area = %boundary.name, "empty boundary, grid has no cells");
                return Ok((AnalysisGrid::empty(resolution), CacheOutcome::Uncached));
            }

            let params = Self::cache_params(boundary, resolution);
            if let Some(grid) = self
                .cache
                .get(ArtifactKind::Grid, &params)
                .await
                .and_then(|a| a.into_grid().ok())
            {
                debug!(cells = grid.len(), "grid served from cache");
                return Ok((grid, CacheOutcome::Hit));
            }

            let owned = boundary.clone();
            let grid = tokio::task::spawn_blocking(move || tile_boundary(&owned, resolution))
                .await
                .map_err(|e| PipelineError::Join {
                    task: "grid tiling".to_string(),
                    reason: e.to_string(),
                })?;

            let (rows, cols) = grid.dimensions();
            info!(cells = grid.len(), rows, cols, resolution, "grid built");

            self.cache.put(&params, &Artifact::Grid(grid.clone())).await;
            Ok((grid, CacheOutcome::Miss))
        }
        .instrument(self.log.span().clone())
        .await
    }
}
