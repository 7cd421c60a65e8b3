//! Stage 2: position series → behavioral events.

pub mod detector;
pub mod event;
pub mod peaks;
pub mod plot;
pub mod signal;

pub use detector::{Detection, EventDetector, SignalAnalysis};
pub use event::{Event, ResultRecord, SignalKind};
pub use signal::{NormalizedSignal, Signal};
