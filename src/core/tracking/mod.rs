//! Stage 1: video frames → position time series.

pub mod extractor;
pub mod geometry;
pub mod record;
pub mod tracker;

pub use extractor::{Extraction, ExtractionStats, PositionExtractor, StopReason};
pub use geometry::{BoundingExtent, Contour, ContourBundle, Measurement};
pub use record::{PositionRecord, PositionSeries};
pub use tracker::{ThresholdTracker, Tracker};
