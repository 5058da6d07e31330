//! Data model shared by the cache and the analysis pipeline

pub mod boundary;
pub mod collection;
pub mod date_range;
pub mod geojson;
pub mod geometry;
pub mod grid;
pub mod landcover;
pub mod station;

pub use boundary::Boundary;
pub use collection::CollectionMetadata;
pub use date_range::DateRange;
pub use geometry::{BoundingBox, MultiPolygon, Point, Polygon, AREA_EPSILON};
pub use grid::{AnalysisGrid, GridCell};
pub use landcover::{LandCoverCategory, LandCoverPolygon};
pub use station::WeatherStation;
