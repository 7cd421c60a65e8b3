pub mod behavior;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod tracking;
pub mod video;
