//! Temporal temperature trends

use crate::error::{PipelineError, ProviderError, Result};
use crate::extract::TemperatureExtractor;
use crate::stats::{self, TemperatureSummary};
use chrono::Datelike;
use heatsense_core::model::{AnalysisGrid, Boundary, DateRange};
use heatsense_core::LogContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

/// Cells above this percentile count as hot in the summary
const HOT_PERCENTILE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMean {
    pub period: DateRange,
    pub mean_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub period: DateRange,
    pub temperature: TemperatureSummary,
    /// Cells above the 80th percentile of the run's temperatures
    pub hot_cells: usize,
    pub data_points: usize,
    /// Empty unless monthly sampling is enabled
    pub monthly: Vec<MonthlyMean>,
    /// Least-squares slope over the monthly means in °C per month
    pub slope_per_month: Option<f64>,
}

/// Summarizes the run's temperatures, optionally month by month
#[derive(Debug, Clone)]
pub struct TemporalTrendSampler {
    extractor: TemperatureExtractor,
    monthly: bool,
    log: LogContext,
}

impl TemporalTrendSampler {
    pub fn new(extractor: TemperatureExtractor, monthly: bool, log: &LogContext) -> Self {
        Self {
            extractor,
            monthly,
            log: log.child("trends"),
        }
    }

    /// Summary of an already sampled grid
    pub fn summarize(grid: &AnalysisGrid, period: &DateRange) -> TrendReport {
        let values: Vec<f64> = grid
            .valid_temperatures()
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        let hot_cells = stats::quantile(&values, HOT_PERCENTILE)
            .map(|q| values.iter().filter(|&&t| t > q).count())
            .unwrap_or(0);
        TrendReport {
            period: *period,
            temperature: TemperatureSummary::from_values(&values),
            hot_cells,
            data_points: values.len(),
            monthly: Vec::new(),
            slope_per_month: None,
        }
    }

    pub async fn sample(
        &self,
        boundary: &Boundary,
        grid: &AnalysisGrid,
        period: &DateRange,
    ) -> Result<TrendReport> {
        async {
            let mut report = Self::summarize(grid, period);
            if !self.monthly {
                return Ok(report);
            }

            for window in period.monthly_windows() {
                match self.extractor.period_mean(boundary, grid, &window).await {
                    Ok(Some(mean)) => report.monthly.push(MonthlyMean {
                        period: window,
                        mean_temperature: mean,
                    }),
                    Ok(None) => debug!(%window, "no temperatures for month"),
                    // Months without scenes are gaps, not failures
                    Err(PipelineError::EmptyResult { .. })
                    | Err(PipelineError::Provider {
                        source: ProviderError::NotFound(_),
                        ..
                    }) => {
                        warn!(%window, "no data for month, skipping");
                    }
                    Err(e) => return Err(e),
                }
            }

            // Skipped months keep their place on the time axis
            let xs: Vec<f64> = report
                .monthly
                .iter()
                .map(|m| months_between(period, &m.period) as f64)
                .collect();
            let ys: Vec<f64> = report.monthly.iter().map(|m| m.mean_temperature).collect();
            report.slope_per_month = stats::linear_slope(&xs, &ys);
            info!(
                months = report.monthly.len(),
                slope = ?report.slope_per_month,
                "monthly trend sampled"
            );
            Ok(report)
        }
        .instrument(self.log.span().clone())
        .await
    }
}

/// Whole months from the start of `period` to the start of `window`
fn months_between(period: &DateRange, window: &DateRange) -> i32 {
    (window.start.year() - period.start.year()) * 12 + window.start.month() as i32
        - period.start.month() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionSettings;
    use crate::grid::tile_boundary;
    use crate::providers::{ImageHandle, ProviderResult, TemperatureService};
    use heatsense_core::model::{BoundingBox, CollectionMetadata, GridCell};
    use heatsense_core::{ArtifactCache, CacheConfig};
    use std::sync::Arc;
    use std::time::Duration;

    /// June at 10 °C, August at 30 °C, nothing for July
    #[derive(Debug)]
    struct SummerWithGap;

    impl TemperatureService for SummerWithGap {
        fn get_mean_temperature_image(
            &self,
            boundary: &Boundary,
            date_range: &DateRange,
            cloud_threshold: f64,
        ) -> ProviderResult<ImageHandle> {
            if date_range.start.month() == 7 {
                return Err(ProviderError::NotFound("no July scenes".to_string()));
            }
            Ok(ImageHandle::from(CollectionMetadata {
                image_id: format!("month-{}", date_range.start.month()),
                scene_count: 1,
                bounds: boundary.bounding_box(),
                date_range: *date_range,
                cloud_threshold,
                acquired_at: chrono::Utc::now(),
            }))
        }

        fn sample(&self, image: &ImageHandle, cells: &[GridCell]) -> ProviderResult<Vec<Option<f64>>> {
            let t = if image.metadata.date_range.start.month() == 6 { 10.0 } else { 30.0 };
            Ok(vec![Some(t); cells.len()])
        }
    }

    #[test]
    fn test_summary_counts_hot_cells() {
        let cells = (0..10u32)
            .map(|i| {
                let extent = BoundingBox::new(i as f64, 0.0, i as f64 + 1.0, 1.0);
                GridCell {
                    id: i,
                    row: 0,
                    col: i,
                    extent,
                    geometry: extent.to_polygon().into(),
                    temperature: if i == 9 { None } else { Some(20.0 + i as f64) },
                }
            })
            .collect();
        let grid = AnalysisGrid {
            resolution: 1.0,
            bounds: BoundingBox::new(0.0, 0.0, 10.0, 1.0),
            cells,
        };
        let period = DateRange::parse("2023-06-01", "2023-08-31").unwrap();
        let report = TemporalTrendSampler::summarize(&grid, &period);
        assert_eq!(report.data_points, 9);
        assert_eq!(report.temperature.mean, Some(24.0));
        // 80th percentile of 20..=28 is 26.4
        assert_eq!(report.hot_cells, 2);
        assert!(report.monthly.is_empty());
        assert_eq!(report.slope_per_month, None);
    }

    #[tokio::test]
    async fn test_slope_spans_skipped_month() {
        let log = LogContext::disabled();
        let cache = Arc::new(ArtifactCache::in_memory(CacheConfig::default(), &log));
        let extractor = TemperatureExtractor::new(
            cache,
            Arc::new(SummerWithGap),
            ExtractionSettings {
                cloud_threshold: 20.0,
                batch_size: 4,
                timeout: Duration::from_secs(5),
            },
            &log,
        );
        let boundary = Boundary::new("box", BoundingBox::new(0.0, 0.0, 2.0, 2.0).to_polygon().into());
        let grid = tile_boundary(&boundary, 1.0).with_temperatures(&[Some(20.0); 4]);
        let period = DateRange::parse("2023-06-01", "2023-08-31").unwrap();

        let report = TemporalTrendSampler::new(extractor, true, &log)
            .sample(&boundary, &grid, &period)
            .await
            .unwrap();

        let months: Vec<u32> = report.monthly.iter().map(|m| m.period.start.month()).collect();
        assert_eq!(months, vec![6, 8]);
        // 20 °C over two months, not one
        assert_eq!(report.slope_per_month, Some(10.0));
    }
}
