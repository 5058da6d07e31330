//! Land-cover classification
//!
//! CORINE Land Cover codes are grouped into the categories that matter for
//! heat-island analysis, each with an imperviousness coefficient (share of
//! sealed surface, 0.0 to 1.0).

use crate::error::CoreError;
use crate::model::geometry::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandCoverCategory {
    DenseUrban,
    Residential,
    Industrial,
    Transport,
    UrbanGreen,
    Agriculture,
    Forest,
    Natural,
    Water,
    OpenAreas,
    /// No land-cover polygon matched, or the code is not mapped
    Unknown,
}

impl LandCoverCategory {
    pub const ALL: [LandCoverCategory; 11] = [
        LandCoverCategory::DenseUrban,
        LandCoverCategory::Residential,
        LandCoverCategory::Industrial,
        LandCoverCategory::Transport,
        LandCoverCategory::UrbanGreen,
        LandCoverCategory::Agriculture,
        LandCoverCategory::Forest,
        LandCoverCategory::Natural,
        LandCoverCategory::Water,
        LandCoverCategory::OpenAreas,
        LandCoverCategory::Unknown,
    ];

    /// Map a three-digit CORINE code
    pub fn from_corine_code(code: u16) -> Self {
        match code {
            111 | 121 => LandCoverCategory::DenseUrban,
            112 => LandCoverCategory::Residential,
            122..=124 => LandCoverCategory::Transport,
            131..=133 => LandCoverCategory::Industrial,
            141 | 142 => LandCoverCategory::UrbanGreen,
            211..=244 => LandCoverCategory::Agriculture,
            311..=313 => LandCoverCategory::Forest,
            321..=324 => LandCoverCategory::Natural,
            331..=335 => LandCoverCategory::OpenAreas,
            411..=523 => LandCoverCategory::Water,
            _ => LandCoverCategory::Unknown,
        }
    }

    pub fn imperviousness(&self) -> f64 {
        match self {
            LandCoverCategory::DenseUrban => 0.90,
            LandCoverCategory::Residential => 0.65,
            LandCoverCategory::Industrial => 0.85,
            LandCoverCategory::Transport => 0.95,
            LandCoverCategory::UrbanGreen => 0.15,
            LandCoverCategory::Agriculture => 0.05,
            LandCoverCategory::Forest => 0.02,
            LandCoverCategory::Natural => 0.03,
            LandCoverCategory::Water => 0.0,
            LandCoverCategory::OpenAreas => 0.05,
            LandCoverCategory::Unknown => 0.5,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LandCoverCategory::DenseUrban => "Dense urban fabric and commercial areas",
            LandCoverCategory::Residential => "Discontinuous residential areas",
            LandCoverCategory::Industrial => "Industrial, mining and construction sites",
            LandCoverCategory::Transport => "Roads, rail, ports and airports",
            LandCoverCategory::UrbanGreen => "Urban parks, sport and leisure facilities",
            LandCoverCategory::Agriculture => "Arable land, pastures and crops",
            LandCoverCategory::Forest => "Broad-leaved, coniferous and mixed forest",
            LandCoverCategory::Natural => "Grassland, heath and shrub vegetation",
            LandCoverCategory::Water => "Wetlands and water bodies",
            LandCoverCategory::OpenAreas => "Open spaces with little or no vegetation",
            LandCoverCategory::Unknown => "Unclassified",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandCoverCategory::DenseUrban => "dense_urban",
            LandCoverCategory::Residential => "residential",
            LandCoverCategory::Industrial => "industrial",
            LandCoverCategory::Transport => "transport",
            LandCoverCategory::UrbanGreen => "urban_green",
            LandCoverCategory::Agriculture => "agriculture",
            LandCoverCategory::Forest => "forest",
            LandCoverCategory::Natural => "natural",
            LandCoverCategory::Water => "water",
            LandCoverCategory::OpenAreas => "open_areas",
            LandCoverCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LandCoverCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LandCoverCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LandCoverCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::Other(format!("unknown land-cover category: {}", s)))
    }
}

/// A classified land-cover polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandCoverPolygon {
    pub corine_code: Option<u16>,
    pub category: LandCoverCategory,
    pub geometry: MultiPolygon,
}

impl LandCoverPolygon {
    pub fn from_corine(code: u16, geometry: MultiPolygon) -> Self {
        Self {
            corine_code: Some(code),
            category: LandCoverCategory::from_corine_code(code),
            geometry,
        }
    }

    pub fn with_category(category: LandCoverCategory, geometry: MultiPolygon) -> Self {
        Self {
            corine_code: None,
            category,
            geometry,
        }
    }

    pub fn imperviousness(&self) -> f64 {
        self.category.imperviousness()
    }
}
