//! 诊断图：信号曲线 + 峰值标记 + 阈值线

use super::detector::SignalAnalysis;
use image::{ImageError, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};
use std::path::{Path, PathBuf};

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 400;
const MARGIN: f32 = 20.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TRACE: Rgb<u8> = Rgb([31, 119, 180]);
const PEAK: Rgb<u8> = Rgb([255, 127, 14]);
const THRESHOLD: Rgb<u8> = Rgb([214, 39, 40]);

pub fn render(analysis: &SignalAnalysis) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let values = &analysis.signal.values;
    if values.is_empty() {
        return canvas;
    }

    let threshold = analysis.signal.threshold;
    let (mut lo, mut hi) = values
        .iter()
        .fold((threshold, threshold), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi - lo < f64::EPSILON {
        lo -= 1.0;
        hi += 1.0;
    }

    let plot_w = WIDTH as f32 - 2.0 * MARGIN;
    let plot_h = HEIGHT as f32 - 2.0 * MARGIN;
    let step = plot_w / (values.len().max(2) - 1) as f32;
    let to_x = |i: usize| MARGIN + i as f32 * step;
    let to_y = |v: f64| HEIGHT as f32 - MARGIN - ((v - lo) / (hi - lo)) as f32 * plot_h;

    let ty = to_y(threshold);
    draw_line_segment_mut(&mut canvas, (MARGIN, ty), (WIDTH as f32 - MARGIN, ty), THRESHOLD);

    for (i, pair) in values.windows(2).enumerate() {
        draw_line_segment_mut(
            &mut canvas,
            (to_x(i), to_y(pair[0])),
            (to_x(i + 1), to_y(pair[1])),
            TRACE,
        );
    }

    let frames = &analysis.signal.frames;
    for event in &analysis.events {
        if let Ok(i) = frames.binary_search(&event.frame_index) {
            draw_cross_mut(&mut canvas, PEAK, to_x(i) as i32, to_y(values[i]) as i32);
        }
    }
    canvas
}

/// Writes `<dir>/<video> <kind> plot.png`.
pub fn save(analysis: &SignalAnalysis, video_id: &str, dir: &Path) -> Result<PathBuf, ImageError> {
    let path = dir.join(format!("{} {} plot.png", video_id, analysis.kind()));
    render(analysis).save(&path)?;
    Ok(path)
}
