//! Tracker adapter
//!
//! Segmentation and identity assignment are consumed through [`Tracker`]. The extractor
//! only relies on the contract: deterministic output for identical input.

use super::geometry::{Contour, ContourBundle, Measurement};
use crate::core::config::TrackingConfig;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::filter::box_filter;

pub trait Tracker: Send + Sync {
    /// Binary mask, 255 where the subject is.
    fn segment(&self, frame: &GrayImage, block_size: u32, offset: i32) -> GrayImage;

    /// Outer blob boundaries whose area lies strictly inside (min_area, max_area).
    fn find_blobs(&self, mask: &GrayImage, min_area: f64, max_area: f64) -> ContourBundle;

    /// `result[i]` is the index in `now` that continues identity `i` of `last`,
    /// or `None` when nothing is left to assign.
    fn assign(&self, last: &[Measurement], now: &[Measurement]) -> Vec<Option<usize>>;

    fn detect(&self, frame: &GrayImage, config: &TrackingConfig) -> ContourBundle {
        let mask = self.segment(frame, config.block_size, config.offset);
        self.find_blobs(&mask, config.min_area, config.max_area)
    }
}

/// Mean-C adaptive threshold (dark subject on a lighter floor), border following for
/// contours and nearest-neighbour identity assignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdTracker;

impl ThresholdTracker {
    pub fn new() -> Self {
        Self
    }
}

impl Tracker for ThresholdTracker {
    fn segment(&self, frame: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
        let radius = block_size / 2;
        let means = box_filter(frame, radius, radius);
        let (width, height) = frame.dimensions();

        let mut mask = GrayImage::new(width, height);
        for (x, y, pixel) in mask.enumerate_pixels_mut() {
            let value = frame.get_pixel(x, y).0[0] as i32;
            let threshold = means.get_pixel(x, y).0[0] as i32 - offset;
            if value <= threshold {
                *pixel = Luma([255]);
            }
        }
        mask
    }

    fn find_blobs(&self, mask: &GrayImage, min_area: f64, max_area: f64) -> ContourBundle {
        find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .map(|c| Contour::new(c.points.iter().map(|p| [p.x, p.y]).collect()))
            .filter(|c| {
                let area = c.area();
                area > min_area && area < max_area
            })
            .collect()
    }

    fn assign(&self, last: &[Measurement], now: &[Measurement]) -> Vec<Option<usize>> {
        let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(last.len() * now.len());
        for (i, l) in last.iter().enumerate() {
            for (j, n) in now.iter().enumerate() {
                pairs.push((l.distance_sq(n), i, j));
            }
        }
        // ties resolved by (last, now) index so the result is deterministic
        pairs.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut mapping = vec![None; last.len()];
        let mut taken = vec![false; now.len()];
        for (_, i, j) in pairs {
            if mapping[i].is_none() && !taken[j] {
                mapping[i] = Some(j);
                taken[j] = true;
            }
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_block(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
                Luma([20])
            } else {
                Luma([200])
            }
        })
    }

    #[test]
    fn test_segment_marks_dark_block() {
        let tracker = ThresholdTracker::new();
        let frame = frame_with_block(200, 160, 60, 60, 40);
        let mask = tracker.segment(&frame, 103, 40);

        assert_eq!(mask.get_pixel(80, 80).0[0], 255);
        assert_eq!(mask.get_pixel(10, 10).0[0], 0);
        assert_eq!(mask.get_pixel(150, 120).0[0], 0);
    }

    #[test]
    fn test_find_blobs_area_band() {
        let tracker = ThresholdTracker::new();
        let frame = frame_with_block(200, 160, 60, 60, 40);
        let config = TrackingConfig::default();

        let bundle = tracker.detect(&frame, &config);
        assert_eq!(bundle.len(), 1);

        let centroid = bundle[0].centroid().unwrap();
        assert!((centroid.x - 79.5).abs() < 1.0);
        assert!((centroid.y - 79.5).abs() < 1.0);

        let narrow = tracker.find_blobs(&tracker.segment(&frame, 103, 40), 2000.0, 3500.0);
        assert!(narrow.is_empty());
    }

    #[test]
    fn test_blank_frame_has_no_blobs() {
        let tracker = ThresholdTracker::new();
        let frame = GrayImage::from_pixel(120, 120, Luma([180]));
        assert!(tracker.detect(&frame, &TrackingConfig::default()).is_empty());
    }

    #[test]
    fn test_assign_nearest() {
        let tracker = ThresholdTracker::new();
        let last = vec![Measurement::new(10.0, 10.0)];
        let now = vec![Measurement::new(90.0, 90.0), Measurement::new(12.0, 11.0)];

        assert_eq!(tracker.assign(&last, &now), vec![Some(1)]);
        assert_eq!(tracker.assign(&last, &[]), vec![None]);
    }

    #[test]
    fn test_assign_is_deterministic_on_ties() {
        let tracker = ThresholdTracker::new();
        let last = vec![Measurement::new(0.0, 0.0)];
        let now = vec![Measurement::new(1.0, 0.0), Measurement::new(0.0, 1.0)];
        assert_eq!(tracker.assign(&last, &now), vec![Some(0)]);
        assert_eq!(tracker.assign(&last, &now), tracker.assign(&last, &now));
    }
}
