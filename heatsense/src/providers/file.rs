//! GeoJSON file-backed providers
//!
//! Each provider reads one FeatureCollection. Land cover accepts either a
//! `corine_code` or a `category` property per feature, stations carry
//! `station_id`, `name` and `temperature`, and temperature samples are
//! points with `temperature` and an optional `date` (`YYYY-MM-DD`).

use super::{
    BoundaryProvider, ImageHandle, LandCoverProvider, ProviderResult, TemperatureService,
    WeatherProvider,
};
use crate::error::ProviderError;
use chrono::{NaiveDate, Utc};
use heatsense_core::model::geojson::{decode_boundary, decode_landcover, read_feature_collection};
use heatsense_core::model::{
    Boundary, BoundingBox, CollectionMetadata, DateRange, GridCell, LandCoverPolygon, Point,
    WeatherStation,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

fn read_file(path: &Path) -> ProviderResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| ProviderError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn malformed(path: &Path, reason: impl ToString) -> ProviderError {
    ProviderError::Malformed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Boundary from a GeoJSON file; all polygon features are merged
#[derive(Debug, Clone)]
pub struct GeoJsonBoundaryProvider {
    path: PathBuf,
}

impl GeoJsonBoundaryProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BoundaryProvider for GeoJsonBoundaryProvider {
    fn fetch_boundary(&self, area: &str) -> ProviderResult<Boundary> {
        let bytes = read_file(&self.path)?;
        let mut boundary = decode_boundary(&bytes).map_err(|e| malformed(&self.path, e))?;
        if boundary.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "boundary of {} in {}",
                area,
                self.path.display()
            )));
        }
        if boundary.name.is_empty() {
            boundary.name = area.to_string();
        }
        debug!(area, polygons = boundary.geometry.polygons().len(), "boundary loaded");
        Ok(boundary)
    }
}

/// Land cover from a GeoJSON file prepared for a single survey year
#[derive(Debug, Clone)]
pub struct GeoJsonLandCoverProvider {
    path: PathBuf,
}

impl GeoJsonLandCoverProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LandCoverProvider for GeoJsonLandCoverProvider {
    fn fetch_landcover(
        &self,
        bounds: &BoundingBox,
        year: i32,
    ) -> ProviderResult<Vec<LandCoverPolygon>> {
        let bytes = read_file(&self.path)?;
        let polygons: Vec<LandCoverPolygon> = decode_landcover(&bytes)
            .map_err(|e| malformed(&self.path, e))?
            .into_iter()
            .filter(|lc| lc.geometry.bounding_box().intersects(bounds))
            .collect();
        debug!(year, polygons = polygons.len(), "land cover loaded");
        Ok(polygons)
    }
}

#[derive(Debug, Default, Deserialize)]
struct StationProperties {
    #[serde(default, alias = "id")]
    station_id: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    temperature: Option<f64>,
}

/// Weather stations from a GeoJSON point file
#[derive(Debug, Clone)]
pub struct GeoJsonStationProvider {
    path: PathBuf,
}

impl GeoJsonStationProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeatherProvider for GeoJsonStationProvider {
    fn fetch_stations(
        &self,
        bounds: &BoundingBox,
        _date_range: &DateRange,
    ) -> ProviderResult<Vec<WeatherStation>> {
        let bytes = read_file(&self.path)?;
        let collection = read_feature_collection::<StationProperties, serde_json::Value>(&bytes)
            .map_err(|e| malformed(&self.path, e))?;

        let mut stations = Vec::new();
        for (index, feature) in collection.features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let location = geometry.to_point().map_err(|e| malformed(&self.path, e))?;
            if !bounds.contains_point(&location) {
                continue;
            }
            let props = feature.properties;
            let id = match props.station_id {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => format!("station-{}", index),
            };
            let name = props.name.unwrap_or_else(|| id.clone());
            let mut station = WeatherStation::new(id, name, location);
            station.temperature = props.temperature.filter(|t| t.is_finite());
            stations.push(station);
        }
        debug!(stations = stations.len(), "weather stations loaded");
        Ok(stations)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SampleProperties {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct TemperatureSample {
    location: Point,
    temperature: f64,
    date: Option<NaiveDate>,
}

/// Temperature service over point samples
///
/// The composite "image" for a period is the mean of all samples inside
/// each cell whose date falls in the period. Undated samples belong to
/// every period.
#[derive(Debug, Clone)]
pub struct PointSampleService {
    path: PathBuf,
    samples: Vec<TemperatureSample>,
}

impl PointSampleService {
    /// Load every sample of the file up front
    pub fn open(path: impl Into<PathBuf>) -> ProviderResult<Self> {
        let path = path.into();
        let bytes = read_file(&path)?;
        let collection = read_feature_collection::<SampleProperties, serde_json::Value>(&bytes)
            .map_err(|e| malformed(&path, e))?;

        let mut samples = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let Some(temperature) = feature.properties.temperature.filter(|t| t.is_finite()) else {
                continue;
            };
            let date = feature
                .properties
                .date
                .as_deref()
                .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
                .transpose()
                .map_err(|e| malformed(&path, format!("invalid sample date: {}", e)))?;
            samples.push(TemperatureSample {
                location: geometry.to_point().map_err(|e| malformed(&path, e))?,
                temperature,
                date,
            });
        }
        debug!(path = %path.display(), samples = samples.len(), "temperature samples loaded");
        Ok(Self { path, samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn in_period<'a>(
        &'a self,
        bounds: &'a BoundingBox,
        period: &'a DateRange,
    ) -> impl Iterator<Item = &'a TemperatureSample> + 'a {
        self.samples.iter().filter(move |s| {
            bounds.contains_point(&s.location) && s.date.map_or(true, |d| period.contains(d))
        })
    }
}

impl TemperatureService for PointSampleService {
    fn get_mean_temperature_image(
        &self,
        boundary: &Boundary,
        date_range: &DateRange,
        cloud_threshold: f64,
    ) -> ProviderResult<ImageHandle> {
        let bounds = boundary.bounding_box();
        let mut dates = BTreeSet::new();
        let mut undated = false;
        let mut count = 0usize;
        for sample in self.in_period(&bounds, date_range) {
            count += 1;
            match sample.date {
                Some(d) => {
                    dates.insert(d);
                }
                None => undated = true,
            }
        }
        if count == 0 {
            return Err(ProviderError::NotFound(format!(
                "temperature samples for {} within {}",
                boundary.name, date_range
            )));
        }

        let scene_count = dates.len() as u32 + u32::from(undated);
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("samples");
        Ok(ImageHandle::from(CollectionMetadata {
            image_id: format!("points:{}:{}", stem, date_range),
            scene_count,
            bounds,
            date_range: *date_range,
            cloud_threshold,
            acquired_at: Utc::now(),
        }))
    }

    fn sample(&self, image: &ImageHandle, cells: &[GridCell]) -> ProviderResult<Vec<Option<f64>>> {
        let meta = &image.metadata;
        let candidates: Vec<&TemperatureSample> =
            self.in_period(&meta.bounds, &meta.date_range).collect();

        Ok(cells
            .iter()
            .map(|cell| {
                let mut sum = 0.0;
                let mut n = 0usize;
                for s in &candidates {
                    if cell.extent.contains_point(&s.location)
                        && cell.geometry.contains_point(&s.location)
                    {
                        sum += s.temperature;
                        n += 1;
                    }
                }
                (n > 0).then(|| sum / n as f64)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn unit_boundary() -> Boundary {
        Boundary::new(
            "unit",
            BoundingBox::new(0.0, 0.0, 2.0, 2.0).to_polygon().into(),
        )
    }

    fn cell(id: u32, extent: BoundingBox) -> GridCell {
        GridCell {
            id,
            row: 0,
            col: id,
            extent,
            geometry: extent.to_polygon().into(),
            temperature: None,
        }
    }

    #[test]
    fn test_boundary_file() {
        let file = write_temp(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{},"geometry":{"type":"Polygon",
                 "coordinates":[[[0,0],[4,0],[4,3],[0,3],[0,0]]]}}]}"#,
        );
        let boundary = GeoJsonBoundaryProvider::new(file.path())
            .fetch_boundary("Testville")
            .unwrap();
        assert_eq!(boundary.name, "Testville");
        assert!((boundary.area() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = GeoJsonBoundaryProvider::new("/nonexistent/boundary.geojson")
            .fetch_boundary("x")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
    }

    #[test]
    fn test_landcover_filtered_by_bounds() {
        let file = write_temp(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"corine_code":"111"},"geometry":{"type":"Polygon",
                 "coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type":"Feature","properties":{"category":"forests"},"geometry":{"type":"Polygon",
                 "coordinates":[[[10,10],[11,10],[11,11],[10,11],[10,10]]]}}]}"#,
        );
        let polygons = GeoJsonLandCoverProvider::new(file.path())
            .fetch_landcover(&BoundingBox::new(0.0, 0.0, 5.0, 5.0), 2018)
            .unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].corine_code, Some(111));
    }

    #[test]
    fn test_stations() {
        let file = write_temp(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"station_id":4711,"name":"Airport","temperature":21.5},
                 "geometry":{"type":"Point","coordinates":[1,1]}},
                {"type":"Feature","properties":{"station_id":"far"},
                 "geometry":{"type":"Point","coordinates":[50,50]}}]}"#,
        );
        let range = DateRange::parse("2023-06-01", "2023-08-31").unwrap();
        let stations = GeoJsonStationProvider::new(file.path())
            .fetch_stations(&BoundingBox::new(0.0, 0.0, 2.0, 2.0), &range)
            .unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id, "4711");
        assert_eq!(stations[0].temperature, Some(21.5));
    }

    #[test]
    fn test_point_samples_respect_period_and_cells() {
        let file = write_temp(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"temperature":20,"date":"2023-07-01"},
                 "geometry":{"type":"Point","coordinates":[0.5,0.5]}},
                {"type":"Feature","properties":{"temperature":30,"date":"2023-07-15"},
                 "geometry":{"type":"Point","coordinates":[0.25,0.75]}},
                {"type":"Feature","properties":{"temperature":99,"date":"2022-01-01"},
                 "geometry":{"type":"Point","coordinates":[0.5,0.5]}},
                {"type":"Feature","properties":{"temperature":40},
                 "geometry":{"type":"Point","coordinates":[1.5,0.5]}}]}"#,
        );
        let service = PointSampleService::open(file.path()).unwrap();
        assert_eq!(service.len(), 4);

        let range = DateRange::parse("2023-06-01", "2023-08-31").unwrap();
        let image = service
            .get_mean_temperature_image(&unit_boundary(), &range, 20.0)
            .unwrap();
        assert_eq!(image.metadata.scene_count, 3);

        let cells = vec![
            cell(0, BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            cell(1, BoundingBox::new(1.0, 0.0, 2.0, 1.0)),
            cell(2, BoundingBox::new(0.0, 1.0, 1.0, 2.0)),
        ];
        let temps = service.sample(&image, &cells).unwrap();
        assert_eq!(temps, vec![Some(25.0), Some(40.0), None]);
    }

    #[test]
    fn test_no_samples_in_period_is_not_found() {
        let file = write_temp(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"temperature":20,"date":"2020-07-01"},
                 "geometry":{"type":"Point","coordinates":[0.5,0.5]}}]}"#,
        );
        let service = PointSampleService::open(file.path()).unwrap();
        let range = DateRange::parse("2023-06-01", "2023-08-31").unwrap();
        let err = service
            .get_mean_temperature_image(&unit_boundary(), &range, 20.0)
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
