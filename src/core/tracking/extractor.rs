//! 位置提取器
//!
//! Frame loop of stage 1. Frames are strictly sequential: identity assignment for frame
//! n needs the measurement of frame n-1.

use super::geometry::{Contour, Measurement};
use super::record::{PositionRecord, PositionSeries};
use super::tracker::Tracker;
use crate::core::config::TrackingConfig;
use crate::core::error::TrackError;
use crate::core::pipeline::CancelToken;
use crate::core::video::{FrameInfo, FrameSource};
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    /// The subject entered the edge margin at this frame.
    LeftArena(u64),
    /// The source repeated or rewound a frame number.
    StalledStream(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionStats {
    pub frames_seen: u64,
    pub recorded: u64,
    /// Current or previous measurement set was empty.
    pub skipped_empty: u64,
    /// The tracked contour could not produce a bounding extent.
    pub skipped_malformed: u64,
    /// The source could not decode the frame.
    pub skipped_decode: u64,
    pub stop: StopReason,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub series: PositionSeries,
    pub stats: ExtractionStats,
}

pub struct PositionExtractor {
    config: TrackingConfig,
}

impl PositionExtractor {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Tracks the subject through `source` until the stream ends, the subject reaches the
    /// edge margin or `cancel` fires. Cancellation discards everything collected so far.
    pub fn extract(
        &self,
        source: &mut dyn FrameSource,
        tracker: &dyn Tracker,
        cancel: &CancelToken,
    ) -> Result<Extraction, TrackError> {
        let video_id = source.name().to_string();
        let individuals = self.config.individuals.max(1);
        let tracked_id = self.config.tracked_id;
        info!("🐭 Tracking {}", video_id);

        // Last known measurement per identity, owned by this run only. Never shrinks or
        // grows: a frame without blobs leaves it untouched so the subject is reacquired
        // by proximity, not by contour order.
        let mut known = vec![Measurement::ORIGIN; individuals];
        // Whether the previous frame produced a measurement set.
        let mut previous_seen = true;

        let mut records: Vec<PositionRecord> = Vec::new();
        let mut stats = ExtractionStats {
            frames_seen: 0,
            recorded: 0,
            skipped_empty: 0,
            skipped_malformed: 0,
            skipped_decode: 0,
            stop: StopReason::EndOfStream,
        };
        let mut previous_frame: Option<u64> = None;

        loop {
            if cancel.is_cancelled() {
                warn!("⏹️ {}: cancelled after {} frames, discarding output", video_id, stats.frames_seen);
                return Err(TrackError::Cancelled);
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(TrackError::Decode { frame, reason }) => {
                    stats.frames_seen += 1;
                    stats.skipped_decode += 1;
                    previous_seen = false;
                    warn!("⚠️ {}: unreadable frame {} skipped: {}", video_id, frame, reason);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if previous_frame.is_some_and(|p| frame.frame_number <= p) {
                stats.stop = StopReason::StalledStream(frame.frame_number);
                break;
            }
            previous_frame = Some(frame.frame_number);
            stats.frames_seen += 1;

            let scaled = frame.scaled(self.config.scaling);
            let info = FrameInfo::from_frame(&scaled);
            let bundle = tracker.detect(&scaled.to_gray(), &self.config);
            let candidates: Vec<(Measurement, &Contour)> = bundle
                .iter()
                .filter_map(|c| c.centroid().map(|m| (m, c)))
                .collect();

            if candidates.is_empty() {
                previous_seen = false;
                stats.skipped_empty += 1;
                debug!("{}: frame {} has no usable measurement", video_id, info.frame_number);
                continue;
            }

            let observed: Vec<Measurement> = candidates.iter().map(|(m, _)| *m).collect();
            let mapping = tracker.assign(&known, &observed);
            for (slot, assigned) in known.iter_mut().zip(&mapping) {
                if let Some(j) = *assigned {
                    *slot = observed[j];
                }
            }

            if !std::mem::replace(&mut previous_seen, true) {
                stats.skipped_empty += 1;
                debug!("{}: frame {} reacquired, previous set empty", video_id, info.frame_number);
                continue;
            }

            let Some(contour_index) = mapping.get(tracked_id).copied().flatten() else {
                stats.skipped_empty += 1;
                debug!("{}: frame {} lost identity {}", video_id, info.frame_number, tracked_id);
                continue;
            };
            let Some(extent) = candidates[contour_index].1.extent() else {
                stats.skipped_malformed += 1;
                warn!("⚠️ {}: tracking error, skipped frame {}", video_id, info.frame_number);
                continue;
            };

            let position = known[tracked_id];
            records.push(PositionRecord::new(info.frame_number, position, extent));
            stats.recorded += 1;
            debug!(
                "{}: frame {} pos=({:.1}, {:.1}) extent={:?}",
                video_id, info.frame_number, position.x, position.y, extent
            );

            if position.near_edge(info.width, info.height, self.config.edge_margin) {
                stats.stop = StopReason::LeftArena(info.frame_number);
                info!("🚪 {}: subject reached the edge at frame {}", video_id, info.frame_number);
                break;
            }
        }

        info!(
            "✅ {}: {} frames, {} recorded, {} empty, {} malformed, {} unreadable ({:?})",
            video_id,
            stats.frames_seen,
            stats.recorded,
            stats.skipped_empty,
            stats.skipped_malformed,
            stats.skipped_decode,
            stats.stop
        );

        let series = PositionSeries::new(video_id, records)?;
        Ok(Extraction { series, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tracking::geometry::ContourBundle;
    use crate::core::tracking::tracker::ThresholdTracker;
    use crate::core::video::{Frame, FrameTransform, ImageSequenceSource, MemorySource};
    use image::{GrayImage, Rgba, RgbaImage};
    use std::sync::atomic::{AtomicU64, Ordering};

    const W: u32 = 240;
    const H: u32 = 200;

    /// Light floor with a dark 40×40 subject whose top-left corner is (x, y), in
    /// unscaled coordinates.
    fn subject_frame(x: u32, y: u32, n: u64) -> Frame {
        let image = RgbaImage::from_fn(W, H, |px, py| {
            if px >= x && px < x + 40 && py >= y && py < y + 40 {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([200, 200, 200, 255])
            }
        });
        Frame::new(image, n)
    }

    fn blank_frame(n: u64) -> Frame {
        Frame::new(RgbaImage::from_pixel(W, H, Rgba([200, 200, 200, 255])), n)
    }

    fn unscaled() -> TrackingConfig {
        TrackingConfig {
            scaling: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_tracks_moving_subject() {
        let frames = (0..5)
            .map(|i| subject_frame(80 + i * 4, 70, i as u64 + 1))
            .collect();
        let mut source = MemorySource::new("moving", frames);
        let extractor = PositionExtractor::new(unscaled());

        let result = extractor
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(result.stats.recorded, 5);
        assert_eq!(result.stats.stop, StopReason::EndOfStream);
        let records = result.series.records();
        assert_eq!(records.iter().map(|r| r.frame_index).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(records[0].min_x, 80);
        assert_eq!(records[0].min_y, 70);
        assert_eq!(records[0].max_x, 119);
        assert_eq!(records[4].min_x, 96);
        assert!((records[0].pos_x - 99.5).abs() < 1.0);
        for r in records {
            assert!(r.max_x >= r.min_x && r.max_y >= r.min_y);
        }
    }

    #[test]
    fn test_empty_frames_are_dropped_not_zero_filled() {
        let frames = vec![
            subject_frame(80, 70, 1),
            blank_frame(2),
            subject_frame(82, 70, 3),
            subject_frame(84, 70, 4),
        ];
        let mut source = MemorySource::new("gap", frames);
        let extractor = PositionExtractor::new(unscaled());

        let result = extractor
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();

        // frame 2: nothing found; frame 3: previous set empty
        let frames: Vec<u64> = result.series.records().iter().map(|r| r.frame_index).collect();
        assert_eq!(frames, vec![1, 4]);
        assert_eq!(result.stats.skipped_empty, 2);
    }

    #[test]
    fn test_stops_at_edge_margin() {
        let frames = vec![
            subject_frame(80, 70, 1),
            subject_frame(190, 70, 2),
            subject_frame(80, 70, 3),
        ];
        let mut source = MemorySource::new("edge", frames);
        let extractor = PositionExtractor::new(TrackingConfig {
            edge_margin: 40.0,
            ..unscaled()
        });

        let result = extractor
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(result.stats.stop, StopReason::LeftArena(2));
        assert_eq!(result.series.len(), 2);
        assert_eq!(result.stats.frames_seen, 2);
    }

    #[test]
    fn test_scaling_applies_before_segmentation() {
        let frames = vec![subject_frame(80, 60, 1), subject_frame(84, 60, 2)];
        let mut source = MemorySource::new("scaled", frames);
        let config = TrackingConfig {
            scaling: 0.5,
            min_area: 200.0,
            max_area: 3500.0,
            block_size: 51,
            edge_margin: 5.0,
            ..Default::default()
        };
        let extractor = PositionExtractor::new(config);

        let result = extractor
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(result.series.len(), 2);
        let first = result.series.records()[0];
        assert!((first.min_x - 40).abs() <= 1);
        assert!((first.pos_y - 40.0).abs() < 2.0);
    }

    #[test]
    fn test_cancellation_discards_output() {
        let frames = (0..3).map(|i| subject_frame(80, 70, i + 1)).collect();
        let mut source = MemorySource::new("cancel", frames);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = PositionExtractor::new(unscaled()).extract(&mut source, &ThresholdTracker::new(), &cancel);
        assert!(matches!(result, Err(TrackError::Cancelled)));
    }

    #[test]
    fn test_stalled_stream_stops() {
        let frames = vec![subject_frame(80, 70, 1), subject_frame(82, 70, 2), subject_frame(84, 70, 2)];
        let mut source = MemorySource::new("stall", frames);
        let result = PositionExtractor::new(unscaled())
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();
        assert_eq!(result.stats.stop, StopReason::StalledStream(2));
        assert_eq!(result.series.len(), 2);
    }

    /// Subject at (x, y) plus a second dark 40×40 blob near the top-left corner.
    fn subject_with_intruder(x: u32, y: u32, n: u64) -> Frame {
        let mut frame = subject_frame(x, y, n);
        for py in 25..65 {
            for px in 30..70 {
                frame.image.put_pixel(px, py, Rgba([20, 20, 20, 255]));
            }
        }
        frame
    }

    #[test]
    fn test_identity_survives_blob_loss() {
        let frames = vec![
            subject_frame(150, 120, 1),
            blank_frame(2),
            subject_with_intruder(150, 120, 3),
            subject_with_intruder(152, 120, 4),
            subject_with_intruder(154, 120, 5),
        ];
        let mut source = MemorySource::new("reacquire", frames);
        let result = PositionExtractor::new(unscaled())
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();

        let records = result.series.records();
        assert_eq!(records.iter().map(|r| r.frame_index).collect::<Vec<_>>(), vec![1, 4, 5]);
        for r in records {
            assert!(r.min_x >= 150, "frame {} followed the intruder", r.frame_index);
            assert!((r.pos_y - 139.5).abs() < 1.0);
        }
        assert_eq!(records[2].min_x, 154);
    }

    #[test]
    fn test_unreadable_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5u32 {
            let path = dir.path().join(format!("{:03}.png", i));
            if i == 2 {
                std::fs::write(&path, b"garbage").unwrap();
            } else {
                subject_frame(80 + i * 2, 70, 0).image.save(&path).unwrap();
            }
        }
        let mut source = ImageSequenceSource::open("corrupt", dir.path(), 0, 1, FrameTransform::default()).unwrap();

        let result = PositionExtractor::new(unscaled())
            .extract(&mut source, &ThresholdTracker::new(), &CancelToken::new())
            .unwrap();

        // frame 3 unreadable, frame 4 follows a gap
        let frames: Vec<u64> = result.series.records().iter().map(|r| r.frame_index).collect();
        assert_eq!(frames, vec![1, 2, 5]);
        assert_eq!(result.stats.skipped_decode, 1);
        assert_eq!(result.stats.frames_seen, 5);
        assert_eq!(result.stats.stop, StopReason::EndOfStream);
    }

    /// Returns a two-point contour on the second call, a valid square otherwise.
    struct FlakyTracker {
        calls: AtomicU64,
    }

    impl Tracker for FlakyTracker {
        fn segment(&self, frame: &GrayImage, _block_size: u32, _offset: i32) -> GrayImage {
            frame.clone()
        }

        fn find_blobs(&self, _mask: &GrayImage, _min_area: f64, _max_area: f64) -> ContourBundle {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 1 {
                vec![Contour::new(vec![[100, 100], [101, 100]])]
            } else {
                vec![Contour::new(vec![[90, 90], [110, 90], [110, 110], [90, 110]])]
            }
        }

        fn assign(&self, last: &[Measurement], now: &[Measurement]) -> Vec<Option<usize>> {
            ThresholdTracker.assign(last, now)
        }
    }

    #[test]
    fn test_malformed_contour_is_skipped() {
        let frames = (1..=3).map(blank_frame).collect();
        let mut source = MemorySource::new("flaky", frames);
        let tracker = FlakyTracker {
            calls: AtomicU64::new(0),
        };

        let result = PositionExtractor::new(unscaled())
            .extract(&mut source, &tracker, &CancelToken::new())
            .unwrap();

        assert_eq!(result.stats.skipped_malformed, 1);
        let frames: Vec<u64> = result.series.records().iter().map(|r| r.frame_index).collect();
        assert_eq!(frames, vec![1, 3]);
    }
}
