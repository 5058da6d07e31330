//! External data collaborators
//!
//! The pipeline talks to boundary, land-cover, weather and temperature
//! sources through these blocking traits. The orchestrator runs every call
//! on tokio's blocking pool under a timeout, so implementations may do
//! plain synchronous I/O.

pub mod file;

pub use file::{
    GeoJsonBoundaryProvider, GeoJsonLandCoverProvider, GeoJsonStationProvider,
    PointSampleService,
};

use crate::error::{PipelineError, ProviderError, Result};
use heatsense_core::model::{
    Boundary, BoundingBox, CollectionMetadata, DateRange, GridCell, LandCoverPolygon,
    WeatherStation,
};
use std::fmt::Debug;
use std::time::Duration;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Resolves an area name to its administrative boundary
pub trait BoundaryProvider: Send + Sync + Debug {
    fn fetch_boundary(&self, area: &str) -> ProviderResult<Boundary>;
}

/// Land-cover polygons intersecting a bounding box
pub trait LandCoverProvider: Send + Sync + Debug {
    fn fetch_landcover(&self, bounds: &BoundingBox, year: i32)
        -> ProviderResult<Vec<LandCoverPolygon>>;
}

/// Weather stations with mean observed temperatures for a period
pub trait WeatherProvider: Send + Sync + Debug {
    fn fetch_stations(
        &self,
        bounds: &BoundingBox,
        date_range: &DateRange,
    ) -> ProviderResult<Vec<WeatherStation>>;
}

/// Handle to a mean land-surface-temperature composite
///
/// Carries only the collection descriptor, so a handle can be rebuilt from
/// cached metadata without querying the service again.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    pub metadata: CollectionMetadata,
}

impl From<CollectionMetadata> for ImageHandle {
    fn from(metadata: CollectionMetadata) -> Self {
        Self { metadata }
    }
}

/// Satellite temperature source
pub trait TemperatureService: Send + Sync + Debug {
    /// Build the mean composite over the boundary for a period
    fn get_mean_temperature_image(
        &self,
        boundary: &Boundary,
        date_range: &DateRange,
        cloud_threshold: f64,
    ) -> ProviderResult<ImageHandle>;

    /// Mean temperature per cell, in the order of `cells`
    fn sample(&self, image: &ImageHandle, cells: &[GridCell]) -> ProviderResult<Vec<Option<f64>>>;
}

/// Run a blocking provider call on the blocking pool under a timeout
///
/// A call that times out keeps running on its thread; its result is
/// discarded.
pub async fn call_blocking<T, F>(stage: &str, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce() -> ProviderResult<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(timeout, handle).await {
        Err(_) => Err(PipelineError::timeout(stage, timeout)),
        Ok(Err(e)) => Err(PipelineError::Join {
            task: stage.to_string(),
            reason: e.to_string(),
        }),
        Ok(Ok(result)) => result.map_err(|e| PipelineError::provider(stage, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_blocking_outcomes() {
        let ok = call_blocking("boundary", Duration::from_secs(5), || Ok(7)).await;
        assert_eq!(ok.unwrap(), 7);

        let failed: Result<()> = call_blocking("boundary", Duration::from_secs(5), || {
            Err(ProviderError::NotFound("Atlantis".to_string()))
        })
        .await;
        assert!(matches!(failed, Err(PipelineError::Provider { .. })));

        let slow: Result<()> = call_blocking("temperature", Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;
        assert!(matches!(slow, Err(PipelineError::Timeout { .. })));
    }
}
