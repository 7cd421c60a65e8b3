use image::{imageops, GrayImage, RgbaImage};

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    /// 1-based index in the sub-video.
    pub frame_number: u64,
}

impl Frame {
    pub fn new(image: RgbaImage, frame_number: u64) -> Self {
        Self {
            image,
            frame_number,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Bilinear rescale by `factor`; a factor of 1.0 returns an unchanged copy.
    pub fn scaled(&self, factor: f32) -> Frame {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self.clone();
        }
        let target_width = ((self.width() as f32 * factor).round() as u32).max(1);
        let target_height = ((self.height() as f32 * factor).round() as u32).max(1);
        let resized = imageops::resize(
            &self.image,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Frame {
            image: resized,
            frame_number: self.frame_number,
        }
    }

    pub fn to_gray(&self) -> GrayImage {
        imageops::grayscale(&self.image)
    }
}

/// 帧元数据（轻量级，用于日志）
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            frame_number: frame.frame_number,
        }
    }
}
