//! mousetrack CLI
//!
//! Commands:
//! - run: track every sub-video of a manifest and count rears/stretches
//! - track: stage 1 only, leaves position tables in the processing directory
//! - detect: stage 2 only, over existing position tables

use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mousetrack::api::BehaviorAnalyzer;
use mousetrack::core::config::RunConfig;
use mousetrack::core::error::PipelineError;
use mousetrack::core::pipeline::{write_results, Manifest, RunCoordinator, RESULTS_FILE};
use mousetrack::core::tracking::ThresholdTracker;

/// Rodent rearing / stretching counter
#[derive(Parser)]
#[command(name = "mousetrack")]
#[command(version)]
#[command(about = "Track a rodent in cropped arena video and count behavioral events", long_about = None)]
struct Cli {
    /// JSON run configuration; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track and analyse every sub-video of a manifest
    Run {
        /// Manifest listing source frame directories and arena regions
        #[arg(short, long)]
        manifest: PathBuf,

        /// Keep the per-video position tables
        #[arg(long)]
        keep_intermediate: bool,
    },

    /// Only extract position tables
    Track {
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Only detect events in existing position tables
    Detect {
        /// Position tables (`<video>.csv`)
        #[arg(required = true)]
        tables: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    mousetrack::init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            manifest,
            keep_intermediate,
        } => {
            let config = RunConfig {
                keep_intermediate: config.keep_intermediate || keep_intermediate,
                ..config
            };
            let analyzer = BehaviorAnalyzer::create(config)?;
            let report = analyzer.run(&Manifest::load(manifest)?)?;
            for row in &report.results {
                println!("{}\trears={}\tstretches={}", row.video, row.rears, row.stretches);
            }
            info!("📄 Results written to {}", report.results_path.display());
            Ok(())
        }

        Commands::Track { manifest } => {
            let config = RunConfig {
                keep_intermediate: true,
                ..config
            };
            let analyzer = BehaviorAnalyzer::create(config)?;
            for table in analyzer.track(&Manifest::load(manifest)?)? {
                println!("{}", table.display());
            }
            Ok(())
        }

        Commands::Detect { tables } => cmd_detect(config, &tables),
    }
}

fn cmd_detect(config: RunConfig, tables: &[PathBuf]) -> Result<(), PipelineError> {
    config.validate()?;
    std::fs::create_dir_all(&config.results_dir).map_err(mousetrack::core::error::RecordError::Io)?;
    let results_path = config.results_dir.join(RESULTS_FILE);
    let coordinator = RunCoordinator::new(config, ThresholdTracker::new());

    let mut results = Vec::new();
    for outcome in coordinator.detect(tables)? {
        match outcome {
            Ok(row) => {
                println!("{}\trears={}\tstretches={}", row.video, row.rears, row.stretches);
                results.push(row);
            }
            Err(failure) => error!("❌ {}: {}", failure.video, failure.reason),
        }
    }
    write_results(&results, &results_path)?;
    info!("📄 Results written to {}", results_path.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RunConfig, PipelineError> {
    match path {
        Some(path) => Ok(RunConfig::load(path)?),
        None => Ok(RunConfig::default()),
    }
}
