//! 运行配置
//!
//! All calibration values live here as named fields. The detection modifiers are
//! empirically tuned and should be treated as adjustable, not as structural constants.

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stage 1 parameters handed to the tracker adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Frame scale applied before segmentation, in (0, 1].
    pub scaling: f32,
    /// Adaptive threshold neighbourhood, must be odd.
    pub block_size: u32,
    /// Subtracted from the neighbourhood mean.
    pub offset: i32,
    /// Blob area band in pixels (scaled frame).
    pub min_area: f64,
    pub max_area: f64,
    /// Tracking stops once the subject is this close to any frame edge.
    pub edge_margin: f64,
    pub individuals: usize,
    pub tracked_id: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            scaling: 0.75,
            block_size: 103,
            offset: 40,
            min_area: 1000.0,
            max_area: 3500.0,
            edge_margin: 20.0,
            individuals: 1,
            tracked_id: 0,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scaling > 0.0 && self.scaling <= 1.0) {
            return Err(invalid("scaling", format!("{} not in (0, 1]", self.scaling)));
        }
        if self.block_size == 0 || self.block_size % 2 == 0 {
            return Err(invalid(
                "block_size",
                format!("{} must be odd and positive", self.block_size),
            ));
        }
        if self.min_area < 0.0 || self.min_area > self.max_area {
            return Err(invalid(
                "min_area",
                format!("band [{}, {}] is empty", self.min_area, self.max_area),
            ));
        }
        if self.individuals == 0 || self.tracked_id >= self.individuals {
            return Err(invalid(
                "tracked_id",
                format!("{} out of {} individuals", self.tracked_id, self.individuals),
            ));
        }
        Ok(())
    }
}

/// Stage 2 calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub rear_mod: f64,
    pub stretch_mod: f64,
    /// Minimum real time between two events of the same kind.
    pub refractory_secs: f64,
    /// Frame rate of the source before stride sampling.
    pub source_fps: f64,
    /// Every `frame_stride`-th source frame is kept.
    pub frame_stride: u32,
    pub plots: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rear_mod: 0.94,
            stretch_mod: 1.94,
            refractory_secs: 12.0,
            source_fps: 30.0,
            frame_stride: 6,
            plots: true,
        }
    }
}

impl DetectionConfig {
    /// Every source frame tracked; same refractory period in seconds.
    pub fn for_every_frame() -> Self {
        Self {
            frame_stride: 1,
            ..Default::default()
        }
    }

    /// Debounce window in sampled frames. 12 s at 30 fps with stride 6 gives 60.
    pub fn debounce_frames(&self) -> u64 {
        let source_frames = self.refractory_secs * self.source_fps;
        (source_frames / self.frame_stride.max(1) as f64).floor().max(1.0) as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_stride == 0 {
            return Err(invalid("frame_stride", "must be at least 1".into()));
        }
        if !(self.source_fps > 0.0) {
            return Err(invalid("source_fps", format!("{} must be positive", self.source_fps)));
        }
        if self.refractory_secs < 0.0 {
            return Err(invalid(
                "refractory_secs",
                format!("{} must not be negative", self.refractory_secs),
            ));
        }
        if !(self.rear_mod.is_finite() && self.stretch_mod.is_finite()) {
            return Err(invalid("rear_mod", "modifiers must be finite".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub tracking: TrackingConfig,
    pub detection: DetectionConfig,
    /// Position CSVs, one per sub-video.
    pub processing_dir: PathBuf,
    /// results.csv and plots.
    pub results_dir: PathBuf,
    pub keep_intermediate: bool,
    /// 0 means one worker per CPU.
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            detection: DetectionConfig::default(),
            processing_dir: PathBuf::from("processing"),
            results_dir: PathBuf::from("results"),
            keep_intermediate: false,
            workers: 0,
        }
    }
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracking.validate()?;
        self.detection.validate()
    }

    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounce_window() {
        let config = DetectionConfig::default();
        assert_eq!(config.debounce_frames(), 60);
        assert_eq!(DetectionConfig::for_every_frame().debounce_frames(), 360);
    }

    #[test]
    fn test_rejects_even_block_size() {
        let config = TrackingConfig {
            block_size: 102,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "block_size", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_scaling_and_area_band() {
        let config = TrackingConfig {
            scaling: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackingConfig {
            min_area: 4000.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{ "tracking": { "block_size": 51 }, "detection": { "frame_stride": 3 } }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tracking.block_size, 51);
        assert_eq!(config.tracking.offset, 40);
        assert_eq!(config.detection.frame_stride, 3);
        assert_eq!(config.detection.debounce_frames(), 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "detection": { "frame_stride": 0 } }"#).unwrap();
        assert!(matches!(
            RunConfig::load(&path),
            Err(ConfigError::Invalid { field: "frame_stride", .. })
        ));
    }
}
