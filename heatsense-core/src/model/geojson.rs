//! GeoJSON codec for geometry artifacts
//!
//! Grids, boundaries and land-cover polygons are stored as GeoJSON
//! FeatureCollections so cached entries stay readable by GIS tooling. Rings
//! are written closed (first vertex repeated) and the duplicate is dropped on
//! read. Polygon holes are ignored when reading.

use crate::error::{CoreError, Result};
use crate::model::boundary::Boundary;
use crate::model::geometry::{BoundingBox, MultiPolygon, Point, Polygon};
use crate::model::grid::{AnalysisGrid, GridCell};
use crate::model::landcover::{LandCoverCategory, LandCoverPolygon};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A position; extra ordinates (altitude) are accepted and ignored
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point { coordinates: Position },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl GeoJsonGeometry {
    pub fn from_point(p: &Point) -> Self {
        GeoJsonGeometry::Point {
            coordinates: vec![p.x, p.y],
        }
    }

    pub fn from_multipolygon(mp: &MultiPolygon) -> Self {
        GeoJsonGeometry::MultiPolygon {
            coordinates: mp
                .polygons()
                .iter()
                .map(|poly| vec![ring_to_positions(poly)])
                .collect(),
        }
    }

    pub fn to_point(&self) -> Result<Point> {
        match self {
            GeoJsonGeometry::Point { coordinates } => position_to_point(coordinates),
            other => Err(CoreError::InvalidGeometry(format!(
                "expected Point, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn to_multipolygon(&self) -> Result<MultiPolygon> {
        match self {
            GeoJsonGeometry::Polygon { coordinates } => {
                Ok(MultiPolygon::new(vec![rings_to_polygon(coordinates)?]))
            }
            GeoJsonGeometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .map(|rings| rings_to_polygon(rings))
                .collect::<Result<Vec<_>>>()
                .map(MultiPolygon::new),
            GeoJsonGeometry::Point { .. } => Err(CoreError::InvalidGeometry(
                "expected Polygon or MultiPolygon, found Point".to_string(),
            )),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            GeoJsonGeometry::Point { .. } => "Point",
            GeoJsonGeometry::Polygon { .. } => "Polygon",
            GeoJsonGeometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }
}

fn ring_to_positions(poly: &Polygon) -> Vec<Position> {
    poly.closed_ring().iter().map(|p| vec![p.x, p.y]).collect()
}

fn position_to_point(position: &[f64]) -> Result<Point> {
    match position {
        [x, y, ..] => Ok(Point::new(*x, *y)),
        _ => Err(CoreError::InvalidGeometry(format!(
            "position needs at least 2 ordinates, got {}",
            position.len()
        ))),
    }
}

fn rings_to_polygon(rings: &[Vec<Position>]) -> Result<Polygon> {
    let exterior = rings
        .first()
        .ok_or_else(|| CoreError::InvalidGeometry("polygon without exterior ring".to_string()))?;
    let points = exterior
        .iter()
        .map(|pos| position_to_point(pos))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(points))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureCollectionTag {
    #[default]
    FeatureCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de> + Default"))]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub tag: FeatureTag,
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(deserialize_with = "null_as_default")]
    pub properties: P,
}

impl<P> Feature<P> {
    pub fn new(geometry: GeoJsonGeometry, properties: P) -> Self {
        Self {
            tag: FeatureTag::Feature,
            geometry: Some(geometry),
            properties,
        }
    }
}

/// A FeatureCollection with an optional `metadata` foreign member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de> + Default, M: Deserialize<'de>"))]
pub struct FeatureCollection<P, M = ()> {
    #[serde(rename = "type")]
    pub tag: FeatureCollectionTag,
    pub features: Vec<Feature<P>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<M>,
}

impl<P, M> FeatureCollection<P, M> {
    pub fn new(features: Vec<Feature<P>>) -> Self {
        Self {
            tag: FeatureCollectionTag::FeatureCollection,
            features,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: M) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a FeatureCollection with caller-defined property and metadata types
pub fn read_feature_collection<P, M>(bytes: &[u8]) -> Result<FeatureCollection<P, M>>
where
    P: DeserializeOwned + Default,
    M: DeserializeOwned,
{
    Ok(serde_json::from_slice(bytes)?)
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GridCellProperties {
    id: u32,
    row: u32,
    col: u32,
    extent: [f64; 4],
    #[serde(default)]
    temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GridMetadata {
    resolution: f64,
    /// Absent for an empty grid, whose bounds are not finite
    #[serde(default)]
    bounds: Option<[f64; 4]>,
}

pub fn encode_grid(grid: &AnalysisGrid) -> Result<Vec<u8>> {
    let features = grid
        .cells
        .iter()
        .map(|cell| {
            Feature::new(
                GeoJsonGeometry::from_multipolygon(&cell.geometry),
                GridCellProperties {
                    id: cell.id,
                    row: cell.row,
                    col: cell.col,
                    extent: cell.extent.to_array(),
                    temperature: cell.valid_temperature(),
                },
            )
        })
        .collect();
    let metadata = GridMetadata {
        resolution: grid.resolution,
        bounds: (!grid.bounds.is_empty()).then(|| grid.bounds.to_array()),
    };
    let collection = FeatureCollection::new(features).with_metadata(metadata);
    Ok(serde_json::to_vec(&collection)?)
}

pub fn decode_grid(bytes: &[u8]) -> Result<AnalysisGrid> {
    let collection: FeatureCollection<GridCellProperties, GridMetadata> =
        read_feature_collection(bytes)?;
    let metadata = collection
        .metadata
        .ok_or_else(|| CoreError::InvalidGeometry("grid without metadata".to_string()))?;

    let mut cells = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let props = feature.properties;
        if props.id as usize != index {
            return Err(CoreError::InvalidGeometry(format!(
                "grid cell id {} stored at position {}",
                props.id, index
            )));
        }
        let geometry = feature
            .geometry
            .ok_or_else(|| CoreError::InvalidGeometry(format!("grid cell {} has no geometry", props.id)))?
            .to_multipolygon()?;
        cells.push(GridCell {
            id: props.id,
            row: props.row,
            col: props.col,
            extent: BoundingBox::from_array(props.extent),
            geometry,
            temperature: props.temperature,
        });
    }

    Ok(AnalysisGrid {
        resolution: metadata.resolution,
        bounds: metadata
            .bounds
            .map(BoundingBox::from_array)
            .unwrap_or_else(BoundingBox::empty),
        cells,
    })
}

// ---------------------------------------------------------------------------
// Boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BoundaryProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

pub fn encode_boundary(boundary: &Boundary) -> Result<Vec<u8>> {
    let feature = Feature::new(
        GeoJsonGeometry::from_multipolygon(&boundary.geometry),
        BoundaryProperties {
            name: Some(boundary.name.clone()),
        },
    );
    let collection: FeatureCollection<_, ()> = FeatureCollection::new(vec![feature]);
    Ok(serde_json::to_vec(&collection)?)
}

/// Decode a boundary, merging all polygon features into one MultiPolygon
///
/// The name is taken from the first feature carrying a `name` property.
pub fn decode_boundary(bytes: &[u8]) -> Result<Boundary> {
    let collection: FeatureCollection<BoundaryProperties, serde_json::Value> =
        read_feature_collection(bytes)?;
    let mut name = None;
    let mut polygons = Vec::new();
    for feature in collection.features {
        if name.is_none() {
            name = feature.properties.name;
        }
        if let Some(geometry) = feature.geometry {
            polygons.extend(geometry.to_multipolygon()?.0);
        }
    }
    Ok(Boundary::new(name.unwrap_or_default(), MultiPolygon::new(polygons)))
}

// ---------------------------------------------------------------------------
// Land cover
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LandCoverProperties {
    #[serde(
        default,
        alias = "Code_18",
        alias = "CODE_18",
        deserialize_with = "lenient_corine_code",
        skip_serializing_if = "Option::is_none"
    )]
    corine_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Number(u16),
    Text(String),
}

/// CORINE codes arrive as numbers or as strings depending on the source
fn lenient_corine_code<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<CodeRepr>::deserialize(deserializer)? {
        Some(CodeRepr::Number(n)) => Some(n),
        Some(CodeRepr::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

pub fn encode_landcover(polygons: &[LandCoverPolygon]) -> Result<Vec<u8>> {
    let features = polygons
        .iter()
        .map(|lc| {
            Feature::new(
                GeoJsonGeometry::from_multipolygon(&lc.geometry),
                LandCoverProperties {
                    corine_code: lc.corine_code,
                    category: Some(lc.category.to_string()),
                },
            )
        })
        .collect();
    let collection: FeatureCollection<_, ()> = FeatureCollection::new(features);
    Ok(serde_json::to_vec(&collection)?)
}

/// Decode land-cover polygons
///
/// An explicit `category` property wins over the CORINE code; features with
/// neither, or with an unrecognised category, are classified as unknown.
/// Features without geometry are skipped.
pub fn decode_landcover(bytes: &[u8]) -> Result<Vec<LandCoverPolygon>> {
    let collection: FeatureCollection<LandCoverProperties, serde_json::Value> =
        read_feature_collection(bytes)?;
    let mut polygons = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let props = feature.properties;
        let category = match (&props.category, props.corine_code) {
            (Some(name), _) => name.parse().unwrap_or(LandCoverCategory::Unknown),
            (None, Some(code)) => LandCoverCategory::from_corine_code(code),
            (None, None) => LandCoverCategory::Unknown,
        };
        polygons.push(LandCoverPolygon {
            corine_code: props.corine_code,
            category,
            geometry: geometry.to_multipolygon()?,
        });
    }
    Ok(polygons)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> AnalysisGrid {
        let bounds = BoundingBox::new(0.0, 0.0, 2.0, 1.0);
        let cells = (0..2)
            .map(|i| {
                let extent = BoundingBox::new(i as f64, 0.0, i as f64 + 1.0, 1.0);
                GridCell {
                    id: i,
                    row: 0,
                    col: i,
                    extent,
                    geometry: extent.to_polygon().into(),
                    temperature: if i == 0 { Some(24.25) } else { None },
                }
            })
            .collect();
        AnalysisGrid {
            resolution: 1.0,
            bounds,
            cells,
        }
    }

    #[test]
    fn test_grid_survives_encoding() {
        let grid = sample_grid();
        let bytes = encode_grid(&grid).unwrap();
        assert_eq!(decode_grid(&bytes).unwrap(), grid);
    }

    #[test]
    fn test_empty_grid_survives_encoding() {
        let grid = AnalysisGrid::empty(100.0);
        let decoded = decode_grid(&encode_grid(&grid).unwrap()).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.bounds.is_empty());
        assert_eq!(decoded.resolution, 100.0);
    }

    #[test]
    fn test_rings_written_closed() {
        let bytes = encode_boundary(&Boundary::new(
            "square",
            BoundingBox::new(0.0, 0.0, 1.0, 1.0).to_polygon().into(),
        ))
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let ring = &value["features"][0]["geometry"]["coordinates"][0][0];
        assert_eq!(ring.as_array().unwrap().len(), 5);
        assert_eq!(ring[0], ring[4]);
    }

    #[test]
    fn test_truncated_grid_is_an_error() {
        let bytes = encode_grid(&sample_grid()).unwrap();
        assert!(decode_grid(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_decode_landcover_code_variants() {
        let json = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"corine_code": 111},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
                {"type": "Feature", "properties": {"Code_18": "311"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
                {"type": "Feature", "properties": {"category": "water"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let polygons = decode_landcover(json).unwrap();
        assert_eq!(polygons.len(), 4);
        assert_eq!(polygons[0].category, LandCoverCategory::DenseUrban);
        assert_eq!(polygons[1].category, LandCoverCategory::Forest);
        assert_eq!(polygons[1].corine_code, Some(311));
        assert_eq!(polygons[2].category, LandCoverCategory::Water);
        assert_eq!(polygons[3].category, LandCoverCategory::Unknown);
    }

    #[test]
    fn test_decode_boundary_merges_features() {
        let json = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Kreis"},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "MultiPolygon", "coordinates": [[[[2,0],[3,0],[3,1],[2,1],[2,0]]]]}}
            ]
        }"#;
        let boundary = decode_boundary(json).unwrap();
        assert_eq!(boundary.name, "Kreis");
        assert_eq!(boundary.geometry.polygons().len(), 2);
        assert!((boundary.area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_geometry_is_not_an_area() {
        let geometry = GeoJsonGeometry::Point {
            coordinates: vec![1.0, 2.0, 30.0],
        };
        assert_eq!(geometry.to_point().unwrap(), Point::new(1.0, 2.0));
        assert!(geometry.to_multipolygon().is_err());
    }
}
