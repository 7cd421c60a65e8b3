//! 行为信号：派生 + 归一化
//!
//! Both signals are rescaled against their own per-video mean:
//! `v² / (mean · (1 ± MOD))`, threshold `mean' · (1 ± MOD)` on the rescaled values.
//! The sign is negative for the compression signal and positive for the aspect signal.

use super::event::SignalKind;
use crate::core::error::AnalysisError;
use crate::core::tracking::PositionRecord;

const FLAT_TOLERANCE: f64 = 1e-12;

/// Raw signal aligned with the records it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub frames: Vec<u64>,
    pub values: Vec<f64>,
    /// Records left out because the value is undefined for them.
    pub excluded: usize,
}

impl Signal {
    /// Top edge (minY) of every record.
    pub fn compression(records: &[PositionRecord]) -> Self {
        Self {
            kind: SignalKind::Rear,
            frames: records.iter().map(|r| r.frame_index).collect(),
            values: records.iter().map(|r| r.min_y as f64).collect(),
            excluded: 0,
        }
    }

    /// (maxY − minY) / (maxX − minX); zero-width records are excluded.
    pub fn aspect(records: &[PositionRecord]) -> Self {
        let mut frames = Vec::with_capacity(records.len());
        let mut values = Vec::with_capacity(records.len());
        let mut excluded = 0;
        for r in records {
            let width = r.max_x - r.min_x;
            if width == 0 {
                excluded += 1;
                continue;
            }
            frames.push(r.frame_index);
            values.push((r.max_y - r.min_y) as f64 / width as f64);
        }
        Self {
            kind: SignalKind::Stretch,
            frames,
            values,
            excluded,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    /// Rescales against the per-video mean and derives the detection threshold.
    /// Values and threshold come back oriented for a maximum search.
    pub fn normalize(&self, modifier: f64) -> Result<NormalizedSignal, AnalysisError> {
        let degenerate = |reason: String| AnalysisError::DegenerateSignal {
            kind: self.kind,
            reason,
        };

        if self.values.len() < 2 {
            return Err(degenerate(format!(
                "{} usable samples ({} excluded)",
                self.values.len(),
                self.excluded
            )));
        }

        let raw_mean = self.mean();
        let (lo, hi) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi - lo <= FLAT_TOLERANCE * raw_mean.abs().max(1.0) {
            return Err(degenerate(format!("zero variance (constant {})", lo)));
        }

        let factor = 1.0 + self.kind.direction() * modifier;
        let denominator = raw_mean * factor;
        if denominator == 0.0 || !denominator.is_finite() {
            return Err(degenerate(format!(
                "rescale denominator is {} (mean {})",
                denominator, raw_mean
            )));
        }

        let rescaled: Vec<f64> = self.values.iter().map(|v| v * v / denominator).collect();
        if rescaled.iter().any(|v| !v.is_finite()) {
            return Err(degenerate("non-finite rescaled value".into()));
        }
        let threshold = mean(&rescaled) * factor;

        let (values, threshold) = if self.kind.inverted() {
            (rescaled.iter().map(|v| -v).collect(), -threshold)
        } else {
            (rescaled, threshold)
        };

        Ok(NormalizedSignal {
            kind: self.kind,
            frames: self.frames.clone(),
            values,
            threshold,
        })
    }
}

/// Rescaled, oriented signal ready for peak search.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSignal {
    pub kind: SignalKind,
    pub frames: Vec<u64>,
    pub values: Vec<f64>,
    pub threshold: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frame: u64, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> PositionRecord {
        PositionRecord {
            frame_index: frame,
            pos_x: 0.0,
            pos_y: 0.0,
            max_x,
            max_y,
            min_x,
            min_y,
        }
    }

    #[test]
    fn test_aspect_excludes_zero_width() {
        let records = vec![
            record(1, 10, 30, 0, 40),
            record(2, 10, 10, 0, 40),
            record(3, 10, 50, 0, 20),
        ];
        let signal = Signal::aspect(&records);
        assert_eq!(signal.frames, vec![1, 3]);
        assert_eq!(signal.values, vec![2.0, 0.5]);
        assert_eq!(signal.excluded, 1);
    }

    #[test]
    fn test_rear_rescale_and_threshold() {
        let signal = Signal {
            kind: SignalKind::Rear,
            frames: vec![1, 2],
            values: vec![10.0, 30.0],
            excluded: 0,
        };
        let n = signal.normalize(0.5).unwrap();
        // mean 20, denominator 20 * 0.5 = 10 -> 10, 90; threshold mean 50 * 0.5
        assert_eq!(n.values, vec![-10.0, -90.0]);
        assert!((n.threshold + 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_stretch_rescale_and_threshold() {
        let signal = Signal {
            kind: SignalKind::Stretch,
            frames: vec![1, 2],
            values: vec![1.0, 3.0],
            excluded: 0,
        };
        let n = signal.normalize(1.0).unwrap();
        // mean 2, denominator 4 -> 0.25, 2.25; threshold 1.25 * 2
        assert_eq!(n.values, vec![0.25, 2.25]);
        assert!((n.threshold - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_flat_signal_is_degenerate() {
        let signal = Signal {
            kind: SignalKind::Stretch,
            frames: vec![1, 2, 3],
            values: vec![1.5, 1.5, 1.5],
            excluded: 0,
        };
        assert!(matches!(
            signal.normalize(1.94),
            Err(AnalysisError::DegenerateSignal {
                kind: SignalKind::Stretch,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_denominator_is_degenerate() {
        let signal = Signal {
            kind: SignalKind::Rear,
            frames: vec![1, 2],
            values: vec![-1.0, 1.0],
            excluded: 0,
        };
        assert!(signal.normalize(0.94).is_err());

        let signal = Signal {
            kind: SignalKind::Rear,
            frames: vec![1, 2],
            values: vec![1.0, 3.0],
            excluded: 0,
        };
        assert!(signal.normalize(1.0).is_err());
    }

    #[test]
    fn test_too_short_is_degenerate() {
        let signal = Signal::aspect(&[record(1, 5, 5, 0, 10), record(2, 5, 9, 0, 10)]);
        assert_eq!(signal.len(), 1);
        assert!(signal.normalize(1.94).is_err());
    }
}
