//! Comparison of satellite temperatures with ground stations

use crate::stats::{self, Association};
use heatsense_core::model::{AnalysisGrid, WeatherStation};
use heatsense_core::LogContext;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// A grid cell paired with a station whose buffer reaches its centroid
///
/// A station with several cells in range yields one point per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPoint {
    pub station_id: String,
    pub cell_id: u32,
    pub ground_temperature: f64,
    pub satellite_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub stations: usize,
    pub points: Vec<ValidationPoint>,
    pub association: Association,
    pub rmse: Option<f64>,
    /// Mean of satellite minus ground over all points
    pub mean_difference: Option<f64>,
}

impl ValidationReport {
    /// Stations with at least one cell in range
    pub fn matched(&self) -> usize {
        self.points
            .iter()
            .map(|p| p.station_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn points_for(&self, station_id: &str) -> Vec<&ValidationPoint> {
        self.points
            .iter()
            .filter(|p| p.station_id == station_id)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GroundValidator {
    buffer: f64,
    significance_level: f64,
    log: LogContext,
}

impl GroundValidator {
    pub fn new(buffer: f64, significance_level: f64, log: &LogContext) -> Self {
        Self {
            buffer,
            significance_level,
            log: log.child("validation"),
        }
    }

    pub fn validate(&self, grid: &AnalysisGrid, stations: &[WeatherStation]) -> ValidationReport {
        self.log.in_scope(|| {
            let cells: Vec<_> = grid
                .cells
                .iter()
                .filter_map(|c| c.valid_temperature().map(|t| (c.id, c.centroid(), t)))
                .collect();

            let buffer = self.buffer;
            let points: Vec<ValidationPoint> = stations
                .iter()
                .filter_map(|station| {
                    let ground = station.temperature.filter(|t| t.is_finite())?;
                    Some((station, ground))
                })
                .flat_map(|(station, ground)| {
                    cells
                        .iter()
                        .filter(move |(_, centroid, _)| centroid.distance(&station.location) <= buffer)
                        .map(move |&(cell_id, _, t)| ValidationPoint {
                            station_id: station.id.clone(),
                            cell_id,
                            ground_temperature: ground,
                            satellite_temperature: t,
                        })
                })
                .collect();

            if points.is_empty() {
                info!(stations = stations.len(), "no station overlaps the grid");
                return ValidationReport {
                    stations: stations.len(),
                    ..ValidationReport::default()
                };
            }

            let ground: Vec<f64> = points.iter().map(|p| p.ground_temperature).collect();
            let satellite: Vec<f64> = points.iter().map(|p| p.satellite_temperature).collect();
            let diffs: Vec<f64> = satellite.iter().zip(&ground).map(|(s, g)| s - g).collect();
            let rmse = stats::mean(&diffs.iter().map(|d| d * d).collect::<Vec<_>>()).map(f64::sqrt);
            let association = stats::pearson(&satellite, &ground, self.significance_level);

            info!(
                stations = stations.len(),
                points = points.len(),
                r = association.r,
                rmse = ?rmse,
                "ground validation finished"
            );

            ValidationReport {
                stations: stations.len(),
                association,
                rmse,
                mean_difference: stats::mean(&diffs),
                points,
            }
        })
    }
}
