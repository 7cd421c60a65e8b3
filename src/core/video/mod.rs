pub mod frame;
pub mod source;
pub mod transform;

pub use frame::{Frame, FrameInfo};
pub use source::{FrameSource, ImageSequenceSource, MemorySource};
pub use transform::{CropRect, FrameTransform};
