pub mod adjacency;
pub mod config;
pub mod correlation;
pub mod error;
pub mod extract;
pub mod grid;
pub mod hotspot;
pub mod pipeline;
pub mod providers;
pub mod stats;
pub mod trends;
pub mod validation;

pub use config::{AnalysisConfig, PerformanceMode};
pub use error::{PipelineError, ProviderError, Result};
pub use hotspot::{HotspotDetector, HotspotReport, LocalMoran, SignificanceTest};
pub use pipeline::{
    AnalysisReport, AnalysisRequest, PipelineOrchestrator, PipelineRun, Providers, RunOutcome,
    RunState, Stage,
};
pub use providers::{BoundaryProvider, LandCoverProvider, TemperatureService, WeatherProvider};
