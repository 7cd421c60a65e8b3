use crate::core::behavior::SignalKind;
use thiserror::Error;

/// Stage 1 errors. Everything here is fatal for the current video only.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Cannot open video source {0}")]
    SourceUnavailable(String),
    #[error("Cannot decode frame {frame}: {reason}")]
    Decode { frame: u64, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Tracking cancelled")]
    Cancelled,
}

/// Stage 2 errors. Reported per video, never abort the run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Too few position records: {0} (need at least 2)")]
    TooFewRecords(usize),
    #[error("Degenerate {kind} signal: {reason}")]
    DegenerateSignal { kind: SignalKind, reason: String },
}

/// Position / result table errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Frame index not strictly increasing at row {row}: {prev} -> {next}")]
    FrameOrder { row: usize, prev: u64, next: u64 },
    #[error("Invalid bounding extent at frame {0}")]
    InvalidExtent(u64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}
