//! Cached artifact payloads
//!
//! [`Artifact`] is the single dispatch point for serialization: geometry
//! artifacts are GeoJSON, collection metadata is a bincode blob.

use crate::cache::types::ArtifactKind;
use crate::error::{CoreError, Result};
use crate::model::geojson;
use crate::model::{AnalysisGrid, Boundary, CollectionMetadata, LandCoverPolygon};

#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Grid cells without temperatures
    Grid(AnalysisGrid),
    Boundary(Boundary),
    LandCover(Vec<LandCoverPolygon>),
    /// Grid cells with sampled temperatures
    Temperature(AnalysisGrid),
    CollectionMetadata(CollectionMetadata),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Grid(_) => ArtifactKind::Grid,
            Artifact::Boundary(_) => ArtifactKind::Boundary,
            Artifact::LandCover(_) => ArtifactKind::LandCover,
            Artifact::Temperature(_) => ArtifactKind::Temperature,
            Artifact::CollectionMetadata(_) => ArtifactKind::CollectionMetadata,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Artifact::Grid(grid) | Artifact::Temperature(grid) => geojson::encode_grid(grid),
            Artifact::Boundary(boundary) => geojson::encode_boundary(boundary),
            Artifact::LandCover(polygons) => geojson::encode_landcover(polygons),
            Artifact::CollectionMetadata(meta) => Ok(bincode::serialize(meta)?),
        }
    }

    pub fn decode(kind: ArtifactKind, bytes: &[u8]) -> Result<Self> {
        Ok(match kind {
            ArtifactKind::Grid => Artifact::Grid(geojson::decode_grid(bytes)?),
            ArtifactKind::Temperature => Artifact::Temperature(geojson::decode_grid(bytes)?),
            ArtifactKind::Boundary => Artifact::Boundary(geojson::decode_boundary(bytes)?),
            ArtifactKind::LandCover => Artifact::LandCover(geojson::decode_landcover(bytes)?),
            ArtifactKind::CollectionMetadata => {
                Artifact::CollectionMetadata(bincode::deserialize(bytes)?)
            }
        })
    }

    pub fn into_grid(self) -> Result<AnalysisGrid> {
        match self {
            Artifact::Grid(grid) => Ok(grid),
            other => Err(other.mismatch(ArtifactKind::Grid)),
        }
    }

    pub fn into_temperature(self) -> Result<AnalysisGrid> {
        match self {
            Artifact::Temperature(grid) => Ok(grid),
            other => Err(other.mismatch(ArtifactKind::Temperature)),
        }
    }

    pub fn into_boundary(self) -> Result<Boundary> {
        match self {
            Artifact::Boundary(boundary) => Ok(boundary),
            other => Err(other.mismatch(ArtifactKind::Boundary)),
        }
    }

    pub fn into_landcover(self) -> Result<Vec<LandCoverPolygon>> {
        match self {
            Artifact::LandCover(polygons) => Ok(polygons),
            other => Err(other.mismatch(ArtifactKind::LandCover)),
        }
    }

    pub fn into_collection_metadata(self) -> Result<CollectionMetadata> {
        match self {
            Artifact::CollectionMetadata(meta) => Ok(meta),
            other => Err(other.mismatch(ArtifactKind::CollectionMetadata)),
        }
    }

    fn mismatch(&self, expected: ArtifactKind) -> CoreError {
        CoreError::KindMismatch {
            expected: expected.to_string(),
            found: self.kind().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, DateRange, LandCoverCategory};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn metadata() -> CollectionMetadata {
        CollectionMetadata {
            image_id: "LC08_composite".to_string(),
            scene_count: 7,
            bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 8, 31).unwrap(),
            )
            .unwrap(),
            cloud_threshold: 20.0,
            acquired_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_metadata_is_binary() {
        let artifact = Artifact::CollectionMetadata(metadata());
        let bytes = artifact.encode().unwrap();
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
        let decoded = Artifact::decode(ArtifactKind::CollectionMetadata, &bytes).unwrap();
        assert_eq!(decoded, artifact);
    }

    #[test]
    fn test_landcover_keeps_category() {
        let artifact = Artifact::LandCover(vec![LandCoverPolygon::with_category(
            LandCoverCategory::UrbanGreen,
            BoundingBox::new(0.0, 0.0, 1.0, 1.0).to_polygon().into(),
        )]);
        let bytes = artifact.encode().unwrap();
        let decoded = Artifact::decode(ArtifactKind::LandCover, &bytes)
            .unwrap()
            .into_landcover()
            .unwrap();
        assert_eq!(decoded[0].category, LandCoverCategory::UrbanGreen);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        for kind in ArtifactKind::ALL {
            assert!(Artifact::decode(kind, b"\x00\x01garbage").is_err());
        }
    }

    #[test]
    fn test_accessor_mismatch() {
        let err = Artifact::CollectionMetadata(metadata()).into_grid().unwrap_err();
        assert!(matches!(err, CoreError::KindMismatch { .. }));
    }
}
