//! 帧来源
//!
//! Container decoding is out of scope: a sub-video arrives as a directory of still frames
//! (for example `ffmpeg -i in.mp4 frames/%06d.png`). Stride sampling, start offset and the
//! crop/rotation transform are applied here so the tracker sees the prepared sub-video.

use super::frame::Frame;
use super::transform::FrameTransform;
use crate::core::error::TrackError;
use log::{debug, info};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Sequential frame provider. `Ok(None)` marks the end of the stream; a `Decode` error
/// affects only that frame and the next call moves on.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    fn next_frame(&mut self) -> Result<Option<Frame>, TrackError>;
}

/// Frames read from an image sequence on disk.
pub struct ImageSequenceSource {
    name: String,
    /// Remaining (absolute index, path) pairs that survive start/stride sampling.
    pending: VecDeque<(u64, PathBuf)>,
    transform: FrameTransform,
    delivered: u64,
}

impl ImageSequenceSource {
    /// Opens `dir`, skips to `start_frame` and keeps every `stride`-th frame by absolute index.
    pub fn open(
        name: impl Into<String>,
        dir: impl AsRef<Path>,
        start_frame: u64,
        stride: u32,
        transform: FrameTransform,
    ) -> Result<Self, TrackError> {
        let name = name.into();
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            TrackError::SourceUnavailable(format!("{} ({})", dir.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(TrackError::SourceUnavailable(format!(
                "{} (no frames)",
                dir.display()
            )));
        }

        let stride = stride.max(1) as u64;
        let total = files.len();
        let pending: VecDeque<(u64, PathBuf)> = files
            .into_iter()
            .enumerate()
            .map(|(i, path)| (i as u64, path))
            .filter(|(i, _)| *i >= start_frame && i % stride == 0)
            .collect();

        info!(
            "🎬 Opened {}: {} source frames, {} after start={} stride={}",
            name,
            total,
            pending.len(),
            start_frame,
            stride
        );

        Ok(Self {
            name,
            pending,
            transform,
            delivered: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, TrackError> {
        let Some((index, path)) = self.pending.pop_front() else {
            return Ok(None);
        };

        // an undecodable frame still takes its slot in the sub-video numbering
        self.delivered += 1;
        let decoded = image::open(&path).map_err(|e| TrackError::Decode {
            frame: self.delivered,
            reason: format!("{}: {}", path.display(), e),
        })?;
        let mut image = decoded.to_rgba8();
        if !self.transform.is_identity() {
            image = self.transform.apply(&image);
        }

        debug!("{}: source frame {} -> sub-video frame {}", self.name, index, self.delivered);
        Ok(Some(Frame::new(image, self.delivered)))
    }
}

/// Frames already in memory; numbered 1.. in order.
pub struct MemorySource {
    name: String,
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, TrackError> {
        Ok(self.frames.pop_front())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}
