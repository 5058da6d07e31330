//! Run lifecycle and per-stage bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    LoadingInputs,
    Gridding,
    /// Only entered when the temperature grid is not cached
    Extracting,
    ParallelAnalysis,
    Aggregating,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Whether `self -> next` is a legal move
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, LoadingInputs)
            | (LoadingInputs, Gridding)
            | (Gridding, Extracting)
            | (Gridding, ParallelAnalysis)
            | (Extracting, ParallelAnalysis)
            | (ParallelAnalysis, Aggregating)
            | (Aggregating, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::LoadingInputs => "loading_inputs",
            RunState::Gridding => "gridding",
            RunState::Extracting => "extracting",
            RunState::ParallelAnalysis => "parallel_analysis",
            RunState::Aggregating => "aggregating",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub at: DateTime<Utc>,
}

/// Current state plus the timestamped history that led to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTracker {
    state: RunState,
    transitions: Vec<StateTransition>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            state: RunState::Pending,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<StateTransition> {
        self.transitions
    }

    /// Move to `next`; illegal moves are refused and logged
    pub fn advance(&mut self, next: RunState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "refusing illegal state transition");
            return false;
        }
        info!(from = %self.state, to = %next, "pipeline state");
        self.transitions.push(StateTransition {
            from: self.state,
            to: next,
            at: Utc::now(),
        });
        self.state = next;
        true
    }
}

/// Unit of work whose outcome is reported individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configuration,
    Boundary,
    LandCover,
    Stations,
    Grid,
    CollectionMetadata,
    Temperature,
    Correlation,
    Hotspots,
    TemporalTrends,
    GroundValidation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Configuration => "configuration",
            Stage::Boundary => "boundary",
            Stage::LandCover => "land_cover",
            Stage::Stations => "stations",
            Stage::Grid => "grid",
            Stage::CollectionMetadata => "collection_metadata",
            Stage::Temperature => "temperature",
            Stage::Correlation => "correlation",
            Stage::Hotspots => "hotspots",
            Stage::TemporalTrends => "temporal_trends",
            Stage::GroundValidation => "ground_validation",
        }
    }

    /// Optional stages degrade to warnings instead of failing the run
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Stage::Stations | Stage::TemporalTrends | Stage::GroundValidation
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage's result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    Miss,
    /// Stage has no cached artifact
    Uncached,
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOutcome::Hit => write!(f, "hit"),
            CacheOutcome::Miss => write!(f, "miss"),
            CacheOutcome::Uncached => write!(f, "uncached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub cache: CacheOutcome,
    pub elapsed_ms: f64,
}

impl StageRecord {
    pub fn new(stage: Stage, cache: CacheOutcome, elapsed: Duration) -> Self {
        Self {
            stage,
            cache,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}
