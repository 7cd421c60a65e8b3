//! 任务清单
//!
//! A manifest lists source recordings (as frame directories) with the start frame,
//! levelling angle and one crop rectangle per arena. Each rectangle becomes one
//! sub-video named `<folder><name>&<n>`.

use crate::core::error::ConfigError;
use crate::core::video::{CropRect, FrameTransform};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVideo {
    pub frames_dir: PathBuf,
    /// Defaults to the directory name.
    #[serde(default)]
    pub name: Option<String>,
    /// Prefix for the sub-video names, e.g. the experiment folder.
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub start_frame: u64,
    #[serde(default)]
    pub angle: f32,
    /// One entry per arena; empty means the whole frame.
    #[serde(default)]
    pub regions: Vec<CropRect>,
}

impl SourceVideo {
    pub fn base_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .frames_dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.split('.').next().unwrap_or(n).to_string())
                .unwrap_or_else(|| "video".to_string()),
        }
    }

    pub fn jobs(&self) -> Vec<VideoJob> {
        let base = format!("{}{}", self.folder, self.base_name());
        let crops: Vec<Option<CropRect>> = if self.regions.is_empty() {
            vec![None]
        } else {
            self.regions.iter().copied().map(Some).collect()
        };

        crops
            .into_iter()
            .enumerate()
            .map(|(i, crop)| VideoJob {
                name: format!("{}&{}", base, i + 1),
                frames_dir: self.frames_dir.clone(),
                start_frame: self.start_frame,
                transform: FrameTransform {
                    angle: self.angle,
                    crop,
                },
            })
            .collect()
    }
}

/// One prepared sub-video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub name: String,
    pub frames_dir: PathBuf,
    #[serde(default)]
    pub start_frame: u64,
    #[serde(default)]
    pub transform: FrameTransform,
}

impl VideoJob {
    pub fn new(name: impl Into<String>, frames_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            frames_dir: frames_dir.into(),
            start_frame: 0,
            transform: FrameTransform::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub videos: Vec<SourceVideo>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        validate_jobs(&manifest.jobs())?;
        Ok(manifest)
    }

    pub fn jobs(&self) -> Vec<VideoJob> {
        self.videos.iter().flat_map(SourceVideo::jobs).collect()
    }
}

/// Job names become file stems, so they must be unique and free of dots and separators.
pub fn validate_jobs(jobs: &[VideoJob]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for job in jobs {
        if job.name.is_empty() || job.name.contains(['.', '/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "name",
                reason: format!("`{}` cannot be used as a file stem", job.name),
            });
        }
        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError::Invalid {
                field: "name",
                reason: format!("duplicate sub-video `{}`", job.name),
            });
        }
    }
    Ok(())
}
