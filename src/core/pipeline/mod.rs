//! Run coordination: manifest → sub-videos → position tables → results table.

pub mod cancel;
pub mod coordinator;
pub mod job;
pub mod results;

pub use cancel::CancelToken;
pub use coordinator::{RunCoordinator, RunReport, RunStats, Stage, VideoFailure, RESULTS_FILE};
pub use job::{validate_jobs, Manifest, SourceVideo, VideoJob};
pub use results::{read_results, write_results};
