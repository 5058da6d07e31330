//! Study-area boundary

use crate::model::geometry::{BoundingBox, MultiPolygon};
use serde::{Deserialize, Serialize};

/// Named study area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub name: String,
    pub geometry: MultiPolygon,
}

impl Boundary {
    pub fn new(name: impl Into<String>, geometry: MultiPolygon) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.geometry.bounding_box()
    }

    /// True when the boundary encloses no area
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.geometry.area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_boundary() {
        let boundary = Boundary::new("nowhere", MultiPolygon::default());
        assert!(boundary.is_empty());
        assert_eq!(boundary.area(), 0.0);
    }

    #[test]
    fn test_boundary_bbox() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        let boundary = Boundary::new("box", bbox.to_polygon().into());
        assert_eq!(boundary.bounding_box(), bbox);
        assert!((boundary.area() - 400.0).abs() < 1e-9);
    }
}
