// src/compositor.rs
//
// Lane area overlay on the camera frame.
//
// The region between the two lane curves is filled on a blank bird's-eye
// canvas, projected back into the camera perspective through the ROI quad and
// blended over the frame:
//
//   out = original · original_weight + overlay · overlay_weight   (saturating)

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LaneError, Result};
use crate::perspective::{Homography, Quad, Rectifier};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Fill colour of the lane area (RGB).
    pub lane_color: [u8; 3],
    pub original_weight: f64,
    pub overlay_weight: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            lane_color: [0, 0, 255],
            original_weight: 0.5,
            overlay_weight: 0.7,
        }
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: OverlayConfig,
}

impl Compositor {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Render the lane area over `original` and return the blended copy.
    ///
    /// `left_x`/`right_x` are sampled at `plot_y` in bird's-eye pixels.
    /// Without curves (no estimate yet) the frame is returned unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        original: &RgbImage,
        left_x: &[f64],
        right_x: &[f64],
        plot_y: &[f64],
        birdseye_size: (u32, u32),
        frame_width: u32,
        frame_height: u32,
        src_quad: &Quad,
    ) -> Result<RgbImage> {
        let frame_size = (frame_width, frame_height);
        if original.dimensions() != frame_size {
            return Err(LaneError::shape("compositor", frame_size, original.dimensions()));
        }
        let unwarp = Homography::between(Quad::UNIT, birdseye_size, *src_quad, frame_size)?;
        self.compose(original, left_x, right_x, plot_y, &unwarp)
    }

    /// Same as [`render`](Self::render), projecting through the rectifier's
    /// inverse warp instead of rebuilding it.
    pub fn render_with(
        &self,
        original: &RgbImage,
        left_x: &[f64],
        right_x: &[f64],
        plot_y: &[f64],
        rectifier: &Rectifier,
    ) -> Result<RgbImage> {
        self.compose(original, left_x, right_x, plot_y, rectifier.inverse_homography())
    }

    fn compose(
        &self,
        original: &RgbImage,
        left_x: &[f64],
        right_x: &[f64],
        plot_y: &[f64],
        unwarp: &Homography,
    ) -> Result<RgbImage> {
        if original.dimensions() != unwarp.dst_size {
            return Err(LaneError::shape("compositor", unwarp.dst_size, original.dimensions()));
        }
        for curve in [left_x, right_x] {
            if curve.len() != plot_y.len() {
                return Err(LaneError::CurveLengthMismatch {
                    stage: "compositor",
                    expected: plot_y.len(),
                    actual: curve.len(),
                });
            }
        }

        let polygon = lane_polygon(left_x, right_x, plot_y);
        if polygon.len() < 3 {
            debug!("No lane area to draw ({} polygon points)", polygon.len());
            return Ok(original.clone());
        }

        let (bw, bh) = unwarp.src_size;
        let mut canvas = RgbImage::new(bw, bh);
        draw_polygon_mut(&mut canvas, &polygon, Rgb(self.config.lane_color));
        let overlay = unwarp.warp(&canvas)?;

        Ok(self.blend(original, &overlay))
    }

    fn blend(&self, original: &RgbImage, overlay: &RgbImage) -> RgbImage {
        let wo = self.config.original_weight;
        let wl = self.config.overlay_weight;
        let mut out = original.clone();
        for (dst, lane) in out.pixels_mut().zip(overlay.pixels()) {
            for c in 0..3 {
                let v = dst[c] as f64 * wo + lane[c] as f64 * wl;
                dst[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    }
}

/// Left curve top → bottom, then right curve bottom → top. Consecutive
/// duplicates are dropped and the ring is left open.
fn lane_polygon(left_x: &[f64], right_x: &[f64], plot_y: &[f64]) -> Vec<Point<i32>> {
    let left = left_x.iter().zip(plot_y);
    let right = right_x.iter().zip(plot_y).rev();

    let mut points: Vec<Point<i32>> = Vec::with_capacity(plot_y.len() * 2);
    for (&x, &y) in left.chain(right) {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let p = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}
