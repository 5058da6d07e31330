//! Run outcome and the assembled analysis report

use crate::config::PerformanceMode;
use crate::correlation::CorrelationResult;
use crate::error::PipelineError;
use crate::hotspot::HotspotReport;
use crate::pipeline::state::{RunState, Stage, StageRecord, StateTransition};
use crate::trends::TrendReport;
use crate::validation::ValidationReport;
use chrono::{DateTime, Utc};
use heatsense_core::model::{CollectionMetadata, DateRange};
use heatsense_core::{CacheStats, MaintenanceReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An optional stage that produced no result, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStage {
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub area: String,
    pub period: DateRange,
    pub landcover_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PerformanceMode>,
    pub grid_resolution: f64,
    pub grid_cells: usize,
    pub valid_cells: usize,
    pub collection: CollectionMetadata,
    pub correlation: CorrelationResult,
    pub hotspots: HotspotReport,
    pub trends: Option<TrendReport>,
    pub validation: Option<ValidationReport>,
    pub skipped: Vec<SkippedStage>,
    pub warnings: Vec<String>,
    pub stages: Vec<StageRecord>,
    pub cache: CacheStats,
    /// Maintenance passes at run start and end
    pub maintenance: Vec<MaintenanceReport>,
}

impl AnalysisReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let fmt_t = |t: Option<f64>| t.map_or("n/a".to_string(), |v| format!("{:.2} °C", v));

        out.push_str(&format!("Area: {} ({})\n", self.area, self.period));
        out.push_str(&format!(
            "Grid: {} cells at {} m, {} with temperature\n",
            self.grid_cells, self.grid_resolution, self.valid_cells
        ));
        out.push_str(&format!(
            "Composite: {} ({} scenes)\n",
            self.collection.image_id, self.collection.scene_count
        ));
        out.push_str(&format!(
            "Mean temperature: {}, range {} .. {}\n",
            fmt_t(self.correlation.overall.mean),
            fmt_t(self.correlation.overall.min),
            fmt_t(self.correlation.overall.max)
        ));
        let a = &self.correlation.association;
        out.push_str(&format!(
            "Imperviousness correlation: r = {:.3}, p = {:.4}{}\n",
            a.r,
            a.p_value,
            if a.significant { " (significant)" } else { "" }
        ));

        out.push_str("Land cover:\n");
        for c in self.correlation.ranked() {
            out.push_str(&format!(
                "  {:<12} {:>6} cells  mean {}\n",
                c.category.as_str(),
                c.temperature.count,
                fmt_t(c.temperature.mean)
            ));
        }

        out.push_str(&format!(
            "Hotspots: {} cells in {} clusters (threshold {})\n",
            self.hotspots.hotspots.len(),
            self.hotspots.clusters.len(),
            fmt_t(self.hotspots.temperature_threshold)
        ));
        if let Some(trends) = &self.trends {
            if let Some(slope) = trends.slope_per_month {
                out.push_str(&format!("Trend: {:+.3} °C per month\n", slope));
            }
        }
        if let Some(validation) = &self.validation {
            out.push_str(&format!(
                "Ground validation: {} points from {} of {} stations, RMSE {}\n",
                validation.points.len(),
                validation.matched(),
                validation.stations,
                validation.rmse.map_or("n/a".to_string(), |r| format!("{:.2}", r))
            ));
        }
        for skipped in &self.skipped {
            out.push_str(&format!("Skipped {}: {}\n", skipped.stage, skipped.reason));
        }
        for warning in &self.warnings {
            out.push_str(&format!("Warning: {}\n", warning));
        }
        out.push_str(&format!("Cache: {}\n", self.cache));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    Provider,
    Timeout,
    EmptyResult,
    Branch,
    Join,
    Core,
}

/// Why a run failed, in a serializable form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, error: &PipelineError) -> Self {
        let kind = match error {
            PipelineError::Config(_) => FailureKind::Config,
            PipelineError::Provider { .. } => FailureKind::Provider,
            PipelineError::Timeout { .. } => FailureKind::Timeout,
            PipelineError::EmptyResult { .. } => FailureKind::EmptyResult,
            PipelineError::Branch { .. } => FailureKind::Branch,
            PipelineError::Join { .. } => FailureKind::Join,
            PipelineError::Core(_) => FailureKind::Core,
        };
        Self {
            stage,
            kind,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} failed: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        report: Box<AnalysisReport>,
    },
    Failed {
        failure: StageFailure,
        /// Stages finished before the failure
        stages: Vec<StageRecord>,
        warnings: Vec<String>,
    },
}

/// Everything one call to the orchestrator produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transitions: Vec<StateTransition>,
    pub outcome: RunOutcome,
}

impl PipelineRun {
    pub fn final_state(&self) -> RunState {
        self.transitions
            .last()
            .map(|t| t.to)
            .unwrap_or(RunState::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match &self.outcome {
            RunOutcome::Completed { report } => Some(report.as_ref()),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            RunOutcome::Failed { failure, .. } => Some(failure),
            RunOutcome::Completed { .. } => None,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_from_error() {
        let failure = StageFailure::new(Stage::Boundary, &PipelineError::empty("boundary"));
        assert_eq!(failure.kind, FailureKind::EmptyResult);
        assert_eq!(failure.to_string(), "stage boundary failed: boundary returned no data");
    }

    #[test]
    fn test_failed_run_serializes_with_status_tag() {
        let now = Utc::now();
        let run = PipelineRun {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            transitions: vec![StateTransition {
                from: RunState::Pending,
                to: RunState::Failed,
                at: now,
            }],
            outcome: RunOutcome::Failed {
                failure: StageFailure::new(Stage::Configuration, &PipelineError::Config("x".into())),
                stages: Vec::new(),
                warnings: Vec::new(),
            },
        };
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["failure"]["kind"], "config");
        assert_eq!(run.final_state(), RunState::Failed);
        assert!(run.report().is_none());
    }
}
