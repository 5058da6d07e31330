//! Pipeline orchestration
//!
//! Inputs load sequentially (boundary, then land cover and stations side by
//! side), the grid and temperatures are read through the cache, and the
//! analysis branches fan out on the blocking pool under a semaphore sized
//! to the worker pool. Correlation and hotspots are required; trends and
//! ground validation degrade to warnings.

use crate::adjacency::Adjacency;
use crate::config::AnalysisConfig;
use crate::correlation::{CorrelationAnalyzer, CorrelationResult};
use crate::error::{PipelineError, ProviderError, Result};
use crate::extract::{ExtractionSettings, TemperatureExtractor};
use crate::grid::AnalysisGridBuilder;
use crate::hotspot::{HotspotDetector, HotspotParams, HotspotReport, LocalMoran, SignificanceTest};
use crate::pipeline::result::{AnalysisReport, PipelineRun, RunOutcome, SkippedStage, StageFailure};
use crate::pipeline::state::{CacheOutcome, RunState, RunTracker, Stage, StageRecord};
use crate::providers::{
    call_blocking, BoundaryProvider, LandCoverProvider, ProviderResult, TemperatureService,
    WeatherProvider,
};
use crate::trends::{TemporalTrendSampler, TrendReport};
use crate::validation::{GroundValidator, ValidationReport};
use chrono::{Datelike, Utc};
use futures::future::join_all;
use heatsense_core::model::{
    AnalysisGrid, Boundary, BoundingBox, DateRange, LandCoverPolygon, WeatherStation,
};
use heatsense_core::{
    Artifact, ArtifactCache, ArtifactKind, CacheParams, LogContext, MaintenanceReport,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What to analyze
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub area: String,
    pub period: DateRange,
    /// Land-cover survey year; defaults to the year the period starts in
    pub landcover_year: i32,
}

impl AnalysisRequest {
    pub fn new(area: impl Into<String>, period: DateRange) -> Self {
        Self {
            area: area.into(),
            landcover_year: period.start.year(),
            period,
        }
    }

    pub fn with_landcover_year(mut self, year: i32) -> Self {
        self.landcover_year = year;
        self
    }
}

/// External collaborators of a run
#[derive(Debug, Clone)]
pub struct Providers {
    pub boundary: Arc<dyn BoundaryProvider>,
    pub landcover: Arc<dyn LandCoverProvider>,
    /// Ground validation is skipped without a weather provider
    pub weather: Option<Arc<dyn WeatherProvider>>,
    pub temperature: Arc<dyn TemperatureService>,
}

/// Value produced by one analysis branch
#[derive(Debug)]
enum BranchOutput {
    Correlation(CorrelationResult),
    Hotspots(HotspotReport),
    Trends(TrendReport),
    Validation(ValidationReport),
}

type BranchHandle = JoinHandle<(Result<BranchOutput>, Duration)>;

/// Mutable bookkeeping of one run
#[derive(Debug, Default)]
struct RunContext {
    tracker: RunTracker,
    stages: Vec<StageRecord>,
    warnings: Vec<String>,
    skipped: Vec<SkippedStage>,
    maintenance: Vec<MaintenanceReport>,
}

impl RunContext {
    fn record(&mut self, stage: Stage, cache: CacheOutcome, started: Instant) {
        let record = StageRecord::new(stage, cache, started.elapsed());
        debug!(stage = %stage, cache = %cache, elapsed_ms = record.elapsed_ms, "stage finished");
        self.stages.push(record);
    }

    fn skip(&mut self, stage: Stage, reason: impl Into<String>) {
        let reason = reason.into();
        info!(stage = %stage, %reason, "stage skipped");
        self.skipped.push(SkippedStage { stage, reason });
    }

    fn degrade(&mut self, stage: Stage, error: &PipelineError) {
        warn!(stage = %stage, error = %error, "optional stage failed");
        self.warnings.push(format!("{}: {}", stage, error));
        self.skipped.push(SkippedStage {
            stage,
            reason: error.to_string(),
        });
    }
}

/// Inputs every branch shares, fully materialized before fan-out
struct BranchInputs {
    boundary: Arc<Boundary>,
    grid: Arc<AnalysisGrid>,
    landcover: Arc<Vec<LandCoverPolygon>>,
    stations: Arc<Vec<WeatherStation>>,
    period: DateRange,
}

#[derive(Debug)]
pub struct PipelineOrchestrator {
    config: Arc<AnalysisConfig>,
    cache: Arc<ArtifactCache>,
    providers: Providers,
    significance: Arc<dyn SignificanceTest>,
    log: LogContext,
}

impl PipelineOrchestrator {
    /// Rejects invalid configuration before any I/O
    pub fn new(
        config: AnalysisConfig,
        cache: Arc<ArtifactCache>,
        providers: Providers,
        log: &LogContext,
    ) -> Result<Self> {
        config.validate()?;
        let significance: Arc<dyn SignificanceTest> =
            Arc::new(LocalMoran::new(config.permutations, config.random_seed));
        Ok(Self {
            config: Arc::new(config),
            cache,
            providers,
            significance,
            log: log.child("pipeline"),
        })
    }

    /// Replace the local autocorrelation test
    pub fn with_significance_test(mut self, test: Arc<dyn SignificanceTest>) -> Self {
        self.significance = test;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    fn extractor(&self) -> TemperatureExtractor {
        TemperatureExtractor::new(
            self.cache.clone(),
            self.providers.temperature.clone(),
            ExtractionSettings {
                cloud_threshold: self.config.cloud_threshold,
                batch_size: self.config.batch_size,
                timeout: self.config.external_timeout(),
            },
            &self.log,
        )
    }

    /// Execute one run; failures are captured in the returned record
    pub async fn run(&self, request: &AnalysisRequest) -> PipelineRun {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            parent: self.log.span(),
            "run",
            run_id = %run_id,
            area = %request.area
        );
        let started_at = Utc::now();

        async {
            info!(period = %request.period, "pipeline run started");
            let mut ctx = RunContext::default();

            self.maintain(&mut ctx).await;
            let result = self.execute(request, &mut ctx).await;
            self.maintain(&mut ctx).await;

            let outcome = match result {
                Ok(mut report) => {
                    report.maintenance = std::mem::take(&mut ctx.maintenance);
                    report.cache = self.cache.stats().await;
                    ctx.tracker.advance(RunState::Completed);
                    info!(
                        cells = report.grid_cells,
                        hotspots = report.hotspots.hotspots.len(),
                        warnings = report.warnings.len(),
                        "pipeline run completed"
                    );
                    RunOutcome::Completed {
                        report: Box::new(report),
                    }
                }
                Err((stage, e)) => {
                    ctx.tracker.advance(RunState::Failed);
                    error!(stage = %stage, error = %e, "pipeline run failed");
                    RunOutcome::Failed {
                        failure: StageFailure::new(stage, &e),
                        stages: std::mem::take(&mut ctx.stages),
                        warnings: std::mem::take(&mut ctx.warnings),
                    }
                }
            };

            PipelineRun {
                run_id,
                started_at,
                finished_at: Utc::now(),
                transitions: ctx.tracker.into_transitions(),
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    /// Expiry and size budget; a failing pass is only logged
    async fn maintain(&self, ctx: &mut RunContext) {
        match self.cache.maintain().await {
            Ok(report) => {
                if report.total_removed() > 0 {
                    info!(
                        removed = report.total_removed(),
                        freed_bytes = report.freed_bytes(),
                        "cache maintenance"
                    );
                }
                ctx.maintenance.push(report);
            }
            Err(e) => warn!(error = %e, "cache maintenance failed"),
        }
    }

    /// Read-through fetch of a cacheable input
    async fn cached_fetch<T, F>(
        &self,
        stage: Stage,
        params: CacheParams,
        kind: ArtifactKind,
        decode: fn(Artifact) -> heatsense_core::Result<T>,
        encode: fn(&T) -> Artifact,
        fetch: F,
    ) -> Result<(T, CacheOutcome)>
    where
        F: FnOnce() -> ProviderResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if let Some(value) = self
            .cache
            .get(kind, &params)
            .await
            .and_then(|artifact| decode(artifact).ok())
        {
            return Ok((value, CacheOutcome::Hit));
        }
        let value = call_blocking(stage.as_str(), self.config.external_timeout(), fetch).await?;
        self.cache.put(&params, &encode(&value)).await;
        Ok((value, CacheOutcome::Miss))
    }

    async fn load_boundary(&self, area: &str) -> Result<(Boundary, CacheOutcome)> {
        let provider = self.providers.boundary.clone();
        let owned_area = area.to_string();
        self.cached_fetch(
            Stage::Boundary,
            CacheParams::new().with("area", area),
            ArtifactKind::Boundary,
            Artifact::into_boundary,
            |b| Artifact::Boundary(b.clone()),
            move || provider.fetch_boundary(&owned_area),
        )
        .await
    }

    async fn load_landcover(
        &self,
        boundary: &Boundary,
        year: i32,
    ) -> Result<(Vec<LandCoverPolygon>, CacheOutcome)> {
        let provider = self.providers.landcover.clone();
        let bounds = boundary.bounding_box();
        self.cached_fetch(
            Stage::LandCover,
            CacheParams::new().with("bbox", bounds).with("year", year),
            ArtifactKind::LandCover,
            Artifact::into_landcover,
            |lc| Artifact::LandCover(lc.clone()),
            move || {
                let polygons = provider.fetch_landcover(&bounds, year)?;
                if polygons.is_empty() {
                    return Err(ProviderError::NotFound(format!(
                        "land cover for {} in {}",
                        boundary_label(&bounds),
                        year
                    )));
                }
                Ok(polygons)
            },
        )
        .await
    }

    async fn load_stations(
        &self,
        boundary: &Boundary,
        period: &DateRange,
    ) -> Option<Result<Vec<WeatherStation>>> {
        let provider = self.providers.weather.clone()?;
        let bounds = boundary.bounding_box();
        let period = *period;
        Some(
            call_blocking(
                Stage::Stations.as_str(),
                self.config.external_timeout(),
                move || provider.fetch_stations(&bounds, &period),
            )
            .await,
        )
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        ctx: &mut RunContext,
    ) -> std::result::Result<AnalysisReport, (Stage, PipelineError)> {
        // Inputs
        ctx.tracker.advance(RunState::LoadingInputs);
        let started = Instant::now();
        let (boundary, outcome) = self
            .load_boundary(&request.area)
            .await
            .map_err(|e| (Stage::Boundary, e))?;
        ctx.record(Stage::Boundary, outcome, started);

        let started = Instant::now();
        let (landcover, stations) = tokio::join!(
            self.load_landcover(&boundary, request.landcover_year),
            self.load_stations(&boundary, &request.period)
        );
        let (landcover, outcome) = landcover.map_err(|e| (Stage::LandCover, e))?;
        ctx.record(Stage::LandCover, outcome, started);

        let stations = match stations {
            None => Vec::new(),
            Some(Ok(stations)) => {
                ctx.record(Stage::Stations, CacheOutcome::Uncached, started);
                stations
            }
            Some(Err(e)) => {
                ctx.degrade(Stage::Stations, &e);
                Vec::new()
            }
        };

        // Grid
        ctx.tracker.advance(RunState::Gridding);
        let started = Instant::now();
        let builder = AnalysisGridBuilder::new(self.cache.clone(), &self.log);
        let (grid, outcome) = builder
            .build_or_get(&boundary, self.config.grid_resolution)
            .await
            .map_err(|e| (Stage::Grid, e))?;
        ctx.record(Stage::Grid, outcome, started);

        // Temperatures
        let extractor = self.extractor();
        let started = Instant::now();
        let (grid, collection) = match extractor.cached(&grid, &request.period).await {
            Some(cached) => {
                ctx.record(Stage::Temperature, CacheOutcome::Hit, started);
                let started = Instant::now();
                let (collection, outcome) = extractor
                    .collection(&boundary, &request.period)
                    .await
                    .map_err(|e| (Stage::CollectionMetadata, e))?;
                ctx.record(Stage::CollectionMetadata, outcome, started);
                (cached, collection)
            }
            None => {
                ctx.tracker.advance(RunState::Extracting);
                let extraction = extractor
                    .extract(&boundary, &grid, &request.period)
                    .await
                    .map_err(|e| (Stage::Temperature, e))?;
                ctx.record(Stage::CollectionMetadata, extraction.collection_cache, started);
                ctx.record(Stage::Temperature, CacheOutcome::Miss, started);
                (extraction.grid, extraction.collection)
            }
        };

        // Analysis
        ctx.tracker.advance(RunState::ParallelAnalysis);
        let inputs = BranchInputs {
            boundary: Arc::new(boundary),
            grid: Arc::new(grid),
            landcover: Arc::new(landcover),
            stations: Arc::new(stations),
            period: request.period,
        };
        let branches = self.fan_out(&inputs, extractor, ctx);
        let results = join_all(branches.into_iter().map(|(stage, handle)| async move {
            let joined = handle.await.map_err(|e| PipelineError::Join {
                task: stage.to_string(),
                reason: e.to_string(),
            });
            (stage, joined)
        }))
        .await;

        let mut correlation = None;
        let mut hotspots = None;
        let mut trends = None;
        let mut validation = None;
        let mut required_failure = None;

        for (stage, joined) in results {
            let (result, elapsed) = match joined {
                Ok(pair) => pair,
                Err(e) => (Err(e), Duration::ZERO),
            };
            match result {
                Ok(output) => {
                    ctx.stages
                        .push(StageRecord::new(stage, CacheOutcome::Uncached, elapsed));
                    match output {
                        BranchOutput::Correlation(r) => correlation = Some(r),
                        BranchOutput::Hotspots(r) => hotspots = Some(r),
                        BranchOutput::Trends(r) => trends = Some(r),
                        BranchOutput::Validation(r) => validation = Some(r),
                    }
                }
                Err(e) if stage.is_optional() => ctx.degrade(stage, &e),
                Err(e) => {
                    error!(stage = %stage, error = %e, "required branch failed");
                    if required_failure.is_none() {
                        required_failure = Some((stage, e));
                    }
                }
            }
        }
        if let Some(failure) = required_failure {
            return Err(failure);
        }
        let correlation = correlation.ok_or_else(|| {
            (
                Stage::Correlation,
                PipelineError::branch(Stage::Correlation.as_str(), "produced no result"),
            )
        })?;
        let hotspots = hotspots.ok_or_else(|| {
            (
                Stage::Hotspots,
                PipelineError::branch(Stage::Hotspots.as_str(), "produced no result"),
            )
        })?;

        // Report
        ctx.tracker.advance(RunState::Aggregating);
        Ok(AnalysisReport {
            area: request.area.clone(),
            period: request.period,
            landcover_year: request.landcover_year,
            mode: self.config.mode,
            grid_resolution: self.config.grid_resolution,
            grid_cells: inputs.grid.len(),
            valid_cells: inputs.grid.valid_temperatures().len(),
            collection,
            correlation,
            hotspots,
            trends,
            validation,
            skipped: std::mem::take(&mut ctx.skipped),
            warnings: std::mem::take(&mut ctx.warnings),
            stages: std::mem::take(&mut ctx.stages),
            cache: Default::default(),
            maintenance: Vec::new(),
        })
    }

    /// Spawn every applicable branch; each waits for a semaphore permit
    fn fan_out(
        &self,
        inputs: &BranchInputs,
        extractor: TemperatureExtractor,
        ctx: &mut RunContext,
    ) -> Vec<(Stage, BranchHandle)> {
        let permits = Arc::new(Semaphore::new(self.config.worker_pool_size));
        let span = tracing::Span::current();
        let mut handles = Vec::new();

        {
            let analyzer = CorrelationAnalyzer::new(self.config.significance_level, &self.log);
            let grid = inputs.grid.clone();
            let landcover = inputs.landcover.clone();
            handles.push((
                Stage::Correlation,
                spawn_blocking_branch(permits.clone(), Stage::Correlation, span.clone(), move || {
                    Ok(BranchOutput::Correlation(analyzer.correlate(&grid, &landcover)))
                }),
            ));
        }

        {
            let detector = HotspotDetector::new(
                HotspotParams {
                    threshold: self.config.hotspot_threshold,
                    significance_level: self.config.significance_level,
                    min_cluster_size: self.config.min_cluster_size,
                },
                self.significance.clone(),
                &self.log,
            );
            let grid = inputs.grid.clone();
            handles.push((
                Stage::Hotspots,
                spawn_blocking_branch(permits.clone(), Stage::Hotspots, span.clone(), move || {
                    let adjacency = Adjacency::queen(&grid);
                    Ok(BranchOutput::Hotspots(detector.detect(&grid, &adjacency)))
                }),
            ));
        }

        if self.config.skip_temporal_trends {
            ctx.skip(Stage::TemporalTrends, "disabled by configuration");
        } else {
            let sampler =
                TemporalTrendSampler::new(extractor, self.config.monthly_trend_sampling, &self.log);
            let boundary = inputs.boundary.clone();
            let grid = inputs.grid.clone();
            let period = inputs.period;
            let permits = permits.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = match permits.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            return (
                                Err(PipelineError::branch(Stage::TemporalTrends.as_str(), e)),
                                Duration::ZERO,
                            )
                        }
                    };
                    let started = Instant::now();
                    let result = sampler
                        .sample(&boundary, &grid, &period)
                        .await
                        .map(BranchOutput::Trends);
                    (result, started.elapsed())
                }
                .instrument(span.clone()),
            );
            handles.push((Stage::TemporalTrends, handle));
        }

        if inputs.stations.is_empty() {
            ctx.skip(Stage::GroundValidation, "no weather stations available");
        } else {
            let validator = GroundValidator::new(
                self.config.station_buffer_m,
                self.config.significance_level,
                &self.log,
            );
            let grid = inputs.grid.clone();
            let stations = inputs.stations.clone();
            handles.push((
                Stage::GroundValidation,
                spawn_blocking_branch(permits, Stage::GroundValidation, span, move || {
                    Ok(BranchOutput::Validation(validator.validate(&grid, &stations)))
                }),
            ));
        }

        handles
    }
}

/// Run a CPU-bound branch on the blocking pool once a permit is free
fn spawn_blocking_branch<F>(
    permits: Arc<Semaphore>,
    stage: Stage,
    span: tracing::Span,
    f: F,
) -> BranchHandle
where
    F: FnOnce() -> Result<BranchOutput> + Send + 'static,
{
    tokio::spawn(
        async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (Err(PipelineError::branch(stage.as_str(), e)), Duration::ZERO),
            };
            let started = Instant::now();
            let inner = tracing::Span::current();
            let result = match tokio::task::spawn_blocking(move || inner.in_scope(f)).await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Join {
                    task: stage.to_string(),
                    reason: e.to_string(),
                }),
            };
            (result, started.elapsed())
        }
        .instrument(span),
    )
}

fn boundary_label(bounds: &BoundingBox) -> String {
    let [min_x, min_y, max_x, max_y] = bounds.to_array();
    format!("[{:.0}, {:.0}, {:.0}, {:.0}]", min_x, min_y, max_x, max_y)
}
