use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Compression signal (top edge of the bounding box).
    Rear,
    /// Aspect signal (height / width of the bounding box).
    Stretch,
}

impl SignalKind {
    /// +1 when the modifier is added to the mean, -1 when it is subtracted.
    pub fn direction(self) -> f64 {
        match self {
            SignalKind::Rear => -1.0,
            SignalKind::Stretch => 1.0,
        }
    }

    /// Rearing shows up as a dip in raw Y, so its signal is negated before the peak search.
    pub fn inverted(self) -> bool {
        matches!(self, SignalKind::Rear)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Rear => "rear",
            SignalKind::Stretch => "stretch",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected episode. `magnitude` is the value of the searched (oriented) signal at
/// the peak, so it is always at or above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: SignalKind,
    pub frame_index: u64,
    pub magnitude: f64,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub video: String,
    pub rears: usize,
    pub stretches: usize,
}
