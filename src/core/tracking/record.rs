//! 位置记录表
//!
//! The only artifact handed from tracking to detection. Column order on disk is fixed:
//! `frame,pos_x,pos_y,maxx,maxy,minx,miny`.

use super::geometry::{BoundingExtent, Measurement};
use crate::core::error::RecordError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(rename = "frame")]
    pub frame_index: u64,
    pub pos_x: f64,
    pub pos_y: f64,
    #[serde(rename = "maxx")]
    pub max_x: i32,
    #[serde(rename = "maxy")]
    pub max_y: i32,
    #[serde(rename = "minx")]
    pub min_x: i32,
    #[serde(rename = "miny")]
    pub min_y: i32,
}

impl PositionRecord {
    pub fn new(frame_index: u64, position: Measurement, extent: BoundingExtent) -> Self {
        Self {
            frame_index,
            pos_x: position.x,
            pos_y: position.y,
            max_x: extent.max_x,
            max_y: extent.max_y,
            min_x: extent.min_x,
            min_y: extent.min_y,
        }
    }

    pub fn extent(&self) -> BoundingExtent {
        BoundingExtent {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x,
            max_y: self.max_y,
        }
    }
}

/// Immutable, validated position time series of one sub-video.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSeries {
    video_id: String,
    records: Vec<PositionRecord>,
}

impl PositionSeries {
    /// Rejects non-increasing frame indices and inverted extents.
    pub fn new(video_id: impl Into<String>, records: Vec<PositionRecord>) -> Result<Self, RecordError> {
        for (row, pair) in records.windows(2).enumerate() {
            if pair[1].frame_index <= pair[0].frame_index {
                return Err(RecordError::FrameOrder {
                    row: row + 1,
                    prev: pair[0].frame_index,
                    next: pair[1].frame_index,
                });
            }
        }
        if let Some(bad) = records.iter().find(|r| !r.extent().is_valid()) {
            return Err(RecordError::InvalidExtent(bad.frame_index));
        }

        Ok(Self {
            video_id: video_id.into(),
            records,
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes through a sibling temp file so a crash never leaves a truncated table.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), RecordError> {
        let path = path.as_ref();
        let tmp = path.with_extension("csv.part");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            for record in &self.records {
                writer.serialize(record)?;
            }
            if self.records.is_empty() {
                writer.write_record(["frame", "pos_x", "pos_y", "maxx", "maxy", "minx", "miny"])?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        debug!("💾 {} rows written to {}", self.records.len(), path.display());
        Ok(())
    }

    /// The video id is the file stem (everything before the first dot).
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<PositionRecord>, csv::Error>>()?;
        Self::new(video_id_from_path(path), records)
    }
}

pub fn video_id_from_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .unwrap_or_default()
}
