//! 行为检测器
//!
//! Stage 2: position series → rear / stretch events. Pure and deterministic; plots are
//! rendered separately from the returned [`SignalAnalysis`].

use super::event::{Event, ResultRecord, SignalKind};
use super::peaks::find_peaks;
use super::signal::{NormalizedSignal, Signal};
use crate::core::config::DetectionConfig;
use crate::core::error::AnalysisError;
use crate::core::tracking::PositionSeries;
use log::{debug, info};

/// Everything needed to explain one signal's count.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalAnalysis {
    pub signal: NormalizedSignal,
    pub events: Vec<Event>,
    /// Records excluded from the signal (zero-width boxes for the aspect signal).
    pub excluded: usize,
}

impl SignalAnalysis {
    pub fn kind(&self) -> SignalKind {
        self.signal.kind
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub rear: SignalAnalysis,
    pub stretch: SignalAnalysis,
    pub result: ResultRecord,
}

pub struct EventDetector {
    config: DetectionConfig,
}

impl EventDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn detect(&self, series: &PositionSeries) -> Result<Detection, AnalysisError> {
        let records = series.records();
        if records.len() < 2 {
            return Err(AnalysisError::TooFewRecords(records.len()));
        }

        let window = self.config.debounce_frames();
        debug!(
            "{}: {} records, debounce window {} frames",
            series.video_id(),
            records.len(),
            window
        );

        let rear = self.analyse(Signal::compression(records), self.config.rear_mod, window)?;
        let stretch = self.analyse(Signal::aspect(records), self.config.stretch_mod, window)?;

        let result = ResultRecord {
            video: series.video_id().to_string(),
            rears: rear.count(),
            stretches: stretch.count(),
        };
        info!("🐁 Rears detected in {}: {}", result.video, result.rears);
        info!("🐁 Stretches detected in {}: {}", result.video, result.stretches);

        Ok(Detection {
            rear,
            stretch,
            result,
        })
    }

    fn analyse(&self, signal: Signal, modifier: f64, window: u64) -> Result<SignalAnalysis, AnalysisError> {
        let excluded = signal.excluded;
        let normalized = signal.normalize(modifier)?;
        let peaks = find_peaks(&normalized.values, &normalized.frames, normalized.threshold, window);

        let events = peaks
            .into_iter()
            .map(|p| Event {
                kind: normalized.kind,
                frame_index: normalized.frames[p],
                magnitude: normalized.values[p],
            })
            .collect();

        Ok(SignalAnalysis {
            signal: normalized,
            events,
            excluded,
        })
    }
}
