//! 预处理变换：旋转 + 裁剪
//!
//! The region of interest and the levelling angle are picked once, outside this crate,
//! and arrive here as plain values.

use image::{imageops, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTransform {
    /// Counter-clockwise, degrees.
    pub angle: f32,
    pub crop: Option<CropRect>,
}

impl FrameTransform {
    pub fn is_identity(&self) -> bool {
        self.angle == 0.0 && self.crop.is_none()
    }

    /// Rotate about the centre, then crop. Areas uncovered by the rotation are black.
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let rotated;
        let levelled = if self.angle != 0.0 {
            rotated = rotate_about_center(
                image,
                -self.angle.to_radians(),
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 255]),
            );
            &rotated
        } else {
            image
        };

        match self.crop {
            Some(rect) => {
                let (w, h) = levelled.dimensions();
                let x = rect.x.min(w.saturating_sub(1));
                let y = rect.y.min(h.saturating_sub(1));
                let width = rect.width.min(w - x).max(1);
                let height = rect.height.min(h - y).max(1);
                imageops::crop_imm(levelled, x, y, width, height).to_image()
            }
            None => levelled.clone(),
        }
    }
}
