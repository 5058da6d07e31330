use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heatsense::pipeline::RunOutcome;
use heatsense::providers::{
    GeoJsonBoundaryProvider, GeoJsonLandCoverProvider, GeoJsonStationProvider, PointSampleService,
};
use heatsense::{
    AnalysisConfig, AnalysisRequest, PerformanceMode, PipelineOrchestrator, Providers,
    WeatherProvider,
};
use heatsense_core::model::DateRange;
use heatsense_core::{ArtifactCache, ArtifactKind, LogContext};

#[derive(Parser)]
#[command(name = "heatsense")]
#[command(about = "Urban heat island analysis", long_about = None)]
struct Cli {
    /// Cache directory (overrides configuration and environment)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Performance mode (preview, fast, standard, detailed)
    #[arg(short, long, global = true)]
    mode: Option<PerformanceMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis for one area and period
    Analyze {
        /// Area name, used for boundary lookup and cache keys
        #[arg(short, long)]
        area: String,

        /// Boundary GeoJSON
        #[arg(long)]
        boundary: PathBuf,

        /// Land-cover GeoJSON
        #[arg(long)]
        landcover: PathBuf,

        /// Temperature point samples GeoJSON
        #[arg(long)]
        temperatures: PathBuf,

        /// Weather station GeoJSON (enables ground validation)
        #[arg(long)]
        stations: Option<PathBuf>,

        /// Period start (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Period end (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Land-cover year (defaults to the start year)
        #[arg(long)]
        year: Option<i32>,

        /// Write the run record as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect and maintain the artifact cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts, sizes and hit rates
    Stats,

    /// Remove all entries, or only one kind
    Clear {
        /// grid, boundary, landcover, temperature or collection-metadata
        #[arg(short, long)]
        kind: Option<ArtifactKind>,
    },

    /// Remove expired entries and enforce the size budget
    Evict,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration as YAML
    Show,
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    config.apply_env()?;
    if let Some(mode) = cli.mode {
        config.apply_mode(mode);
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.cache_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "heatsense=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let log = LogContext::root("heatsense");

    match cli.command {
        Commands::Analyze {
            ref area,
            ref boundary,
            ref landcover,
            ref temperatures,
            ref stations,
            ref start,
            ref end,
            year,
            ref output,
        } => {
            let period = DateRange::parse(start, end).context("invalid analysis period")?;
            let mut request = AnalysisRequest::new(area.clone(), period);
            if let Some(year) = year {
                request = request.with_landcover_year(year);
            }

            let temperature = PointSampleService::open(temperatures)
                .with_context(|| format!("cannot load {}", temperatures.display()))?;
            let providers = Providers {
                boundary: Arc::new(GeoJsonBoundaryProvider::new(boundary)),
                landcover: Arc::new(GeoJsonLandCoverProvider::new(landcover)),
                weather: stations.as_ref().map(|path| {
                    Arc::new(GeoJsonStationProvider::new(path)) as Arc<dyn WeatherProvider>
                }),
                temperature: Arc::new(temperature),
            };

            let cache = Arc::new(ArtifactCache::open(config.cache.clone(), &log)?);
            let orchestrator = PipelineOrchestrator::new(config, cache, providers, &log)?;
            let run = orchestrator.run(&request).await;

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&run)?;
                std::fs::write(path, json)
                    .with_context(|| format!("cannot write {}", path.display()))?;
                println!("Run record written to {}", path.display());
            }

            match &run.outcome {
                RunOutcome::Completed { report } => {
                    println!("Run {} completed in {} ms", run.run_id, run.duration().num_milliseconds());
                    println!("{}", "=".repeat(60));
                    print!("{}", report.summary());
                }
                RunOutcome::Failed { failure, .. } => {
                    bail!("run {} failed: {}", run.run_id, failure);
                }
            }
        }

        Commands::Cache { ref action } => {
            let cache = ArtifactCache::open(config.cache.clone(), &log)?;
            match action {
                CacheAction::Stats => {
                    let stats = cache.stats().await;
                    println!("Cache at {}", config.cache.cache_dir.display());
                    println!("{}", stats);
                }
                CacheAction::Clear { kind } => {
                    let report = cache.clear(*kind).await?;
                    println!(
                        "Removed {} entries ({} bytes)",
                        report.len(),
                        report.freed_bytes()
                    );
                }
                CacheAction::Evict => {
                    let report = cache.maintain().await?;
                    println!(
                        "Removed {} entries ({} bytes)",
                        report.total_removed(),
                        report.freed_bytes()
                    );
                }
            }
        }

        Commands::Config { ref action } => match action {
            ConfigAction::Show => print!("{}", config.to_yaml()?),
        },
    }

    Ok(())
}
