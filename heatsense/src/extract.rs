//! Temperature extraction through the artifact cache
//!
//! Collection metadata and sampled temperature grids are cached, so repeated
//! runs over the same area and period never query the temperature service.

use crate::error::{PipelineError, Result};
use crate::pipeline::{CacheOutcome, Stage};
use crate::providers::{call_blocking, ImageHandle, TemperatureService};
use heatsense_core::model::{AnalysisGrid, Boundary, CollectionMetadata, DateRange};
use heatsense_core::{Artifact, ArtifactCache, ArtifactKind, CacheParams, LogContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Instrument};

/// Settings taken from the analysis configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionSettings {
    pub cloud_threshold: f64,
    pub batch_size: usize,
    pub timeout: Duration,
}

/// A temperature grid together with the composite it was sampled from
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub grid: AnalysisGrid,
    pub collection: CollectionMetadata,
    pub collection_cache: CacheOutcome,
}

#[derive(Debug, Clone)]
pub struct TemperatureExtractor {
    cache: Arc<ArtifactCache>,
    service: Arc<dyn TemperatureService>,
    settings: ExtractionSettings,
    log: LogContext,
}

impl TemperatureExtractor {
    pub fn new(
        cache: Arc<ArtifactCache>,
        service: Arc<dyn TemperatureService>,
        settings: ExtractionSettings,
        log: &LogContext,
    ) -> Self {
        Self {
            cache,
            service,
            settings,
            log: log.child("extract"),
        }
    }

    fn collection_params(&self, boundary: &Boundary, period: &DateRange) -> CacheParams {
        CacheParams::new()
            .with("area", boundary.name.as_str())
            .with("bbox", boundary.bounding_box())
            .with("period", *period)
            .with("cloud_threshold", self.settings.cloud_threshold)
    }

    fn temperature_params(&self, grid: &AnalysisGrid, period: &DateRange) -> CacheParams {
        CacheParams::new()
            .with("bbox", grid.bounds)
            .with("resolution", grid.resolution)
            .with("cells", grid.len() as i64)
            .with("period", *period)
            .with("cloud_threshold", self.settings.cloud_threshold)
    }

    /// Previously sampled temperatures for this grid and period
    pub async fn cached(&self, grid: &AnalysisGrid, period: &DateRange) -> Option<AnalysisGrid> {
        let params = self.temperature_params(grid, period);
        self.cache
            .get(ArtifactKind::Temperature, &params)
            .instrument(self.log.span().clone())
            .await
            .and_then(|a| a.into_temperature().ok())
            .filter(|cached| cached.len() == grid.len())
    }

    /// Composite descriptor for a period, read through the cache
    pub async fn collection(
        &self,
        boundary: &Boundary,
        period: &DateRange,
    ) -> Result<(CollectionMetadata, CacheOutcome)> {
        let params = self.collection_params(boundary, period);
        if let Some(meta) = self
            .cache
            .get(ArtifactKind::CollectionMetadata, &params)
            .await
            .and_then(|a| a.into_collection_metadata().ok())
        {
            debug!(image = %meta.image_id, "collection metadata served from cache");
            return Ok((meta, CacheOutcome::Hit));
        }

        let service = self.service.clone();
        let owned_boundary = boundary.clone();
        let owned_period = *period;
        let cloud_threshold = self.settings.cloud_threshold;
        let image = call_blocking(
            Stage::CollectionMetadata.as_str(),
            self.settings.timeout,
            move || service.get_mean_temperature_image(&owned_boundary, &owned_period, cloud_threshold),
        )
        .await?;

        if image.metadata.is_empty() {
            return Err(PipelineError::empty(Stage::CollectionMetadata.as_str()));
        }
        info!(
            image = %image.metadata.image_id,
            scenes = image.metadata.scene_count,
            "temperature composite ready"
        );
        self.cache
            .put(&params, &Artifact::CollectionMetadata(image.metadata.clone()))
            .await;
        Ok((image.metadata, CacheOutcome::Miss))
    }

    /// Sample the grid for a period and cache the result
    ///
    /// An empty grid is returned unchanged without contacting the service.
    /// A non-empty grid without a single valid temperature is an empty
    /// result.
    pub async fn extract(
        &self,
        boundary: &Boundary,
        grid: &AnalysisGrid,
        period: &DateRange,
    ) -> Result<Extraction> {
        async {
            let (collection, collection_cache) = self.collection(boundary, period).await?;
            if grid.is_empty() {
                return Ok(Extraction {
                    grid: grid.clone(),
                    collection,
                    collection_cache,
                });
            }

            let image = ImageHandle::from(collection.clone());
            let batch_size = self.settings.batch_size.max(1);
            let batches = grid.cells.chunks(batch_size).count();
            let mut temperatures: Vec<Option<f64>> = Vec::with_capacity(grid.len());

            for (batch, cells) in grid.cells.chunks(batch_size).enumerate() {
                let service = self.service.clone();
                let image = image.clone();
                let cells = cells.to_vec();
                let expected = cells.len();
                let sampled = call_blocking(
                    Stage::Temperature.as_str(),
                    self.settings.timeout,
                    move || service.sample(&image, &cells),
                )
                .await?;
                if sampled.len() != expected {
                    return Err(PipelineError::branch(
                        Stage::Temperature.as_str(),
                        format!("service returned {} values for {} cells", sampled.len(), expected),
                    ));
                }
                temperatures.extend(sampled);
                debug!(batch = batch + 1, batches, "temperature batch sampled");
            }

            let sampled = grid.with_temperatures(&temperatures);
            let valid = sampled.valid_temperatures().len();
            if valid == 0 {
                return Err(PipelineError::empty(Stage::Temperature.as_str()));
            }
            info!(cells = sampled.len(), valid, "temperatures extracted");

            let params = self.temperature_params(grid, period);
            self.cache
                .put(&params, &Artifact::Temperature(sampled.clone()))
                .await;

            Ok(Extraction {
                grid: sampled,
                collection,
                collection_cache,
            })
        }
        .instrument(self.log.span().clone())
        .await
    }

    /// Mean temperature of the grid over one period, cached like a full run
    pub async fn period_mean(
        &self,
        boundary: &Boundary,
        grid: &AnalysisGrid,
        period: &DateRange,
    ) -> Result<Option<f64>> {
        let sampled = match self.cached(grid, period).await {
            Some(cached) => cached,
            None => self.extract(boundary, grid, period).await?.grid,
        };
        let values: Vec<f64> = sampled
            .valid_temperatures()
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        Ok(crate::stats::mean(&values))
    }
}
