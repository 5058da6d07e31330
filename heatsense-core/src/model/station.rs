//! Ground weather stations

use crate::model::geometry::Point;
use serde::{Deserialize, Serialize};

/// A station with its observed mean air temperature for the analysis period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStation {
    pub id: String,
    pub name: String,
    pub location: Point,
    /// Mean temperature in °C, if the station reported any data
    pub temperature: Option<f64>,
}

impl WeatherStation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: Point) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}
