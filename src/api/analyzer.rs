//! 行为分析器

use crate::core::behavior::{EventDetector, ResultRecord};
use crate::core::config::RunConfig;
use crate::core::error::{ConfigError, PipelineError};
use crate::core::pipeline::{CancelToken, Manifest, RunCoordinator, RunReport, RunStats, VideoJob};
use crate::core::tracking::{PositionSeries, ThresholdTracker};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Entry point for callers that do not need to swap the tracker.
///
/// ```no_run
/// use mousetrack::api::BehaviorAnalyzer;
/// use mousetrack::core::config::RunConfig;
/// use mousetrack::core::pipeline::Manifest;
///
/// let analyzer = BehaviorAnalyzer::create(RunConfig::default()).unwrap();
/// let manifest = Manifest::load("manifest.json").unwrap();
/// let report = analyzer.run(&manifest).unwrap();
/// println!("{} videos analysed", report.results.len());
/// ```
pub struct BehaviorAnalyzer {
    coordinator: RunCoordinator<ThresholdTracker>,
}

impl BehaviorAnalyzer {
    pub fn create(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "🐭 BehaviorAnalyzer: created (workers: {}, debounce: {} frames)",
            config.worker_count(),
            config.detection.debounce_frames()
        );
        Ok(Self {
            coordinator: RunCoordinator::new(config, ThresholdTracker::new()),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::create(RunConfig::load(path)?)
    }

    /// Tracks and analyses every sub-video of the manifest.
    pub fn run(&self, manifest: &Manifest) -> Result<RunReport, PipelineError> {
        self.run_jobs(&manifest.jobs())
    }

    pub fn run_jobs(&self, jobs: &[VideoJob]) -> Result<RunReport, PipelineError> {
        self.coordinator.run(jobs)
    }

    /// Stage 1 only. Returns the position tables that were written.
    pub fn track(&self, manifest: &Manifest) -> Result<Vec<PathBuf>, PipelineError> {
        let tables = self
            .coordinator
            .track(&manifest.jobs())?
            .into_iter()
            .filter_map(|outcome| match outcome {
                Ok(path) => Some(path),
                Err(failure) => {
                    warn!("⚠️ {} skipped: {}", failure.video, failure.reason);
                    None
                }
            })
            .collect();
        Ok(tables)
    }

    /// Stage 2 on one position table, without writing plots or results.
    pub fn detect_file(&self, path: impl AsRef<Path>) -> Result<ResultRecord, PipelineError> {
        let series = PositionSeries::read_csv(path)?;
        let detector = EventDetector::new(self.coordinator.config().detection.clone());
        Ok(detector.detect(&series)?.result)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.coordinator.cancel_token()
    }

    pub fn stats(&self) -> RunStats {
        self.coordinator.stats()
    }

    pub fn reset(&self) {
        self.coordinator.reset()
    }
}

impl Drop for BehaviorAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ BehaviorAnalyzer: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DetectionConfig, TrackingConfig};

    #[test]
    fn test_create_rejects_invalid_config() {
        let config = RunConfig {
            tracking: TrackingConfig {
                scaling: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(BehaviorAnalyzer::create(config).is_err());
    }

    #[test]
    fn test_detect_file_counts_dip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cage&1.csv");
        let mut text = String::from("frame,pos_x,pos_y,maxx,maxy,minx,miny\n");
        for frame in 1..=60u64 {
            // top edge jumps up once when the subject stands
            let min_y = if frame == 30 { 20 } else { 100 + frame % 3 };
            text.push_str(&format!("{},50,120,70,141,30,{}\n", frame, min_y));
        }
        std::fs::write(&path, text).unwrap();

        let analyzer = BehaviorAnalyzer::create(RunConfig {
            detection: DetectionConfig::for_every_frame(),
            ..Default::default()
        })
        .unwrap();
        let record = analyzer.detect_file(&path).unwrap();
        assert_eq!(record.video, "cage&1");
        assert_eq!(record.rears, 1);
    }

    #[test]
    fn test_run_rejects_invalid_job_names() {
        let analyzer = BehaviorAnalyzer::create(RunConfig::default()).unwrap();
        let jobs = vec![VideoJob::new("a.b", "frames")];
        assert!(matches!(
            analyzer.run_jobs(&jobs),
            Err(PipelineError::Config(ConfigError::Invalid { .. }))
        ));
    }
}
