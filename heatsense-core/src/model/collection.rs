//! Satellite scene collection descriptors

use crate::model::date_range::DateRange;
use crate::model::geometry::BoundingBox;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Describes the composite image a temperature extraction was based on
///
/// Cached as an opaque binary blob so repeated runs can skip the
/// collection query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub image_id: String,
    pub scene_count: u32,
    pub bounds: BoundingBox,
    pub date_range: DateRange,
    /// Maximum cloud cover percentage used when selecting scenes
    pub cloud_threshold: f64,
    pub acquired_at: DateTime<Utc>,
}

impl CollectionMetadata {
    pub fn is_empty(&self) -> bool {
        self.scene_count == 0
    }
}
