//! Run orchestration, lifecycle tracking and reporting

pub mod orchestrator;
pub mod result;
pub mod state;

pub use orchestrator::{AnalysisRequest, PipelineOrchestrator, Providers};
pub use result::{AnalysisReport, FailureKind, PipelineRun, RunOutcome, SkippedStage, StageFailure};
pub use state::{CacheOutcome, RunState, RunTracker, Stage, StageRecord, StateTransition};
