//! 运行协调器
//!
//! Stage 1 over every sub-video, then stage 2 over every persisted position table.
//! Videos run in parallel on a rayon pool; frames within a video never do. The results
//! table is assembled in manifest order and written once.

use super::cancel::CancelToken;
use super::job::{validate_jobs, VideoJob};
use super::results::write_results;
use crate::core::behavior::{plot, EventDetector, ResultRecord};
use crate::core::config::RunConfig;
use crate::core::error::{PipelineError, TrackError};
use crate::core::tracking::{PositionExtractor, PositionSeries, Tracker};
use crate::core::video::ImageSequenceSource;
use log::{error, info, warn};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub const RESULTS_FILE: &str = "results.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tracking,
    Detection,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Tracking => f.write_str("tracking"),
            Stage::Detection => f.write_str("detection"),
        }
    }
}

/// Why a video contributed no result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFailure {
    pub video: String,
    pub stage: Stage,
    pub reason: String,
    pub cancelled: bool,
}

impl VideoFailure {
    fn new(video: &str, stage: Stage, reason: impl ToString) -> Self {
        Self {
            video: video.to_string(),
            stage,
            reason: reason.to_string(),
            cancelled: false,
        }
    }

    fn cancelled(video: &str, stage: Stage) -> Self {
        Self {
            cancelled: true,
            ..Self::new(video, stage, "cancelled")
        }
    }
}

/// Frame counters summed over all videos of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_seen: u64,
    pub recorded: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<ResultRecord>,
    pub failures: Vec<VideoFailure>,
    pub stats: RunStats,
    pub cancelled: bool,
    pub results_path: PathBuf,
}

pub struct RunCoordinator<T: Tracker> {
    config: RunConfig,
    tracker: T,
    cancel: CancelToken,
    stats: Arc<Mutex<RunStats>>,
}

impl<T: Tracker> RunCoordinator<T> {
    pub fn new(config: RunConfig, tracker: T) -> Self {
        Self {
            config,
            tracker,
            cancel: CancelToken::new(),
            stats: Arc::new(Mutex::new(RunStats::default())),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> RunStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = RunStats::default();
        }
    }

    /// Both stages plus the results table.
    pub fn run(&self, jobs: &[VideoJob]) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        self.config.validate()?;
        validate_jobs(jobs)?;
        std::fs::create_dir_all(&self.config.results_dir).map_err(TrackError::Io)?;
        info!("🚀 Run started: {} sub-videos", jobs.len());

        let tracked = self.track(jobs)?;
        let mut failures = Vec::new();
        let mut tables = Vec::new();
        for outcome in tracked {
            match outcome {
                Ok(path) => tables.push(path),
                Err(failure) => failures.push(failure),
            }
        }

        let detected = self.detect(&tables)?;
        let mut results = Vec::new();
        for outcome in detected {
            match outcome {
                Ok(record) => results.push(record),
                Err(failure) => failures.push(failure),
            }
        }

        let results_path = self.config.results_dir.join(RESULTS_FILE);
        write_results(&results, &results_path)?;

        if !self.config.keep_intermediate {
            for table in &tables {
                if let Err(e) = std::fs::remove_file(table) {
                    warn!("Error: {} : {}", table.display(), e);
                }
            }
        }

        let cancelled = self.cancel.is_cancelled();
        for failure in &failures {
            warn!("⚠️ {} skipped at {}: {}", failure.video, failure.stage, failure.reason);
        }
        info!(
            "🏁 Processed in {:.5} minutes: {} analysed, {} skipped{}",
            started.elapsed().as_secs_f64() / 60.0,
            results.len(),
            failures.len(),
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(RunReport {
            results,
            failures,
            stats: self.stats(),
            cancelled,
            results_path,
        })
    }

    /// Stage 1 only. One position table per successful job, in job order. Job names must
    /// be unique since each one owns `<name>.csv`.
    pub fn track(&self, jobs: &[VideoJob]) -> Result<Vec<Result<PathBuf, VideoFailure>>, PipelineError> {
        validate_jobs(jobs)?;
        std::fs::create_dir_all(&self.config.processing_dir).map_err(TrackError::Io)?;
        self.pool()?
            .install(|| Ok(jobs.par_iter().map(|job| self.track_job(job)).collect()))
    }

    /// Stage 2 only, over persisted position tables.
    pub fn detect(&self, tables: &[PathBuf]) -> Result<Vec<Result<ResultRecord, VideoFailure>>, PipelineError> {
        self.pool()?
            .install(|| Ok(tables.par_iter().map(|path| self.detect_table(path)).collect()))
    }

    fn pool(&self) -> Result<rayon::ThreadPool, PipelineError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count())
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))
    }

    fn track_job(&self, job: &VideoJob) -> Result<PathBuf, VideoFailure> {
        if self.cancel.is_cancelled() {
            return Err(VideoFailure::cancelled(&job.name, Stage::Tracking));
        }

        let mut source = ImageSequenceSource::open(
            job.name.clone(),
            &job.frames_dir,
            job.start_frame,
            self.config.detection.frame_stride,
            job.transform,
        )
        .map_err(|e| {
            error!("❌ {}: {}", job.name, e);
            VideoFailure::new(&job.name, Stage::Tracking, e)
        })?;

        let extractor = PositionExtractor::new(self.config.tracking.clone());
        let extraction = match extractor.extract(&mut source, &self.tracker, &self.cancel) {
            Ok(extraction) => extraction,
            Err(TrackError::Cancelled) => return Err(VideoFailure::cancelled(&job.name, Stage::Tracking)),
            Err(e) => {
                error!("❌ {}: {}", job.name, e);
                return Err(VideoFailure::new(&job.name, Stage::Tracking, e));
            }
        };

        if let Ok(mut stats) = self.stats.lock() {
            stats.frames_seen += extraction.stats.frames_seen;
            stats.recorded += extraction.stats.recorded;
            stats.skipped += extraction.stats.skipped_empty
                + extraction.stats.skipped_malformed
                + extraction.stats.skipped_decode;
        }

        let path = self.table_path(&job.name);
        extraction
            .series
            .write_csv(&path)
            .map_err(|e| VideoFailure::new(&job.name, Stage::Tracking, e))?;
        Ok(path)
    }

    fn detect_table(&self, path: &Path) -> Result<ResultRecord, VideoFailure> {
        let name = crate::core::tracking::record::video_id_from_path(path);
        if self.cancel.is_cancelled() {
            return Err(VideoFailure::cancelled(&name, Stage::Detection));
        }

        let series = PositionSeries::read_csv(path).map_err(|e| VideoFailure::new(&name, Stage::Detection, e))?;
        let detector = EventDetector::new(self.config.detection.clone());
        let detection = detector.detect(&series).map_err(|e| {
            warn!("⚠️ {}: analysis failed: {}", name, e);
            VideoFailure::new(&name, Stage::Detection, e)
        })?;

        if self.cancel.is_cancelled() {
            return Err(VideoFailure::cancelled(&name, Stage::Detection));
        }

        if self.config.detection.plots {
            for analysis in [&detection.rear, &detection.stretch] {
                if let Err(e) = plot::save(analysis, &name, &self.config.results_dir) {
                    warn!("⚠️ {}: {} plot not written: {}", name, analysis.kind(), e);
                }
            }
        }
        Ok(detection.result)
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.config.processing_dir.join(format!("{}.csv", name))
    }
}
