// src/segmentation.rs
//
// Lane-pixel segmentation: RGB frame → binary mask (255 = candidate pixel).
//
// Two strategies:
//
//   EdgeColorSegmenter (default)
//     gray → Canny(50, 100, built-in σ 1.4 blur) → dilate → erode
//     OR  HSV in-range yellow  OR  HSV in-range white
//
//   SaturationGradientSegmenter
//     HLS → mixed Sobel (dx=1, dy=1) on L, scaled by its maximum → threshold
//     OR  S channel threshold
//
// HSV/HLS values use the 8-bit conventions of the calibration tooling the
// thresholds were tuned with: H in 0..180, S and V/L in 0..255.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{dilate, erode};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    EdgeColor,
    SaturationGradient,
}

/// Inclusive HSV box, bounds as [h, s, v].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub mode: SegmentationMode,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Square structuring element for the dilate/erode pass.
    pub morph_kernel: u32,
    pub yellow: HsvRange,
    pub white: HsvRange,
    /// S-channel band for the saturation/gradient strategy.
    pub s_thresh: [u8; 2],
    /// Scaled gradient band for the saturation/gradient strategy.
    pub sx_thresh: [u8; 2],
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            mode: SegmentationMode::EdgeColor,
            canny_low: 50.0,
            canny_high: 100.0,
            morph_kernel: 5,
            yellow: HsvRange {
                lower: [18, 94, 140],
                upper: [48, 255, 255],
            },
            white: HsvRange {
                lower: [0, 0, 200],
                upper: [255, 255, 255],
            },
            s_thresh: [100, 255],
            sx_thresh: [15, 255],
        }
    }
}

/// Frame → binary lane mask.
pub trait Segmenter: Send {
    fn segment(&self, frame: &RgbImage) -> GrayImage;
}

pub fn build_segmenter(config: &SegmentationConfig) -> Box<dyn Segmenter> {
    match config.mode {
        SegmentationMode::EdgeColor => Box::new(EdgeColorSegmenter::new(config.clone())),
        SegmentationMode::SaturationGradient => {
            Box::new(SaturationGradientSegmenter::new(config.s_thresh, config.sx_thresh))
        }
    }
}

// ============================================================================
// COLOUR SPACE CONVERSION
// ============================================================================

/// ITU-R BT.601 luma.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    let (w, h) = frame.dimensions();
    let mut gray = Vec::with_capacity((w * h) as usize);
    for pixel in frame.as_raw().chunks_exact(3) {
        let g = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
        gray.push(g.round().min(255.0) as u8);
    }
    GrayImage::from_raw(w, h, gray).unwrap_or_else(|| GrayImage::new(w, h))
}

/// RGB → HSV with H in 0..180, S and V in 0..255.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max <= 0.0 { 0.0 } else { delta * 255.0 / max };

    [
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round().min(255.0) as u8,
        max as u8,
    ]
}

/// RGB → (L, S) of HLS, both in 0..255.
#[inline]
pub fn rgb_to_ls(r: u8, g: u8, b: u8) -> (u8, u8) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;
    let s = if delta <= 0.0 {
        0.0
    } else if l < 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };
    (
        (l * 255.0).round().min(255.0) as u8,
        (s * 255.0).round().min(255.0) as u8,
    )
}

// ============================================================================
// EDGE + COLOUR STRATEGY
// ============================================================================

pub struct EdgeColorSegmenter {
    config: SegmentationConfig,
}

impl EdgeColorSegmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Canny edges closed with one dilate and one erode.
    ///
    /// `canny` applies its own Gaussian (sigma 1.4) before the gradient, which
    /// is the only smoothing pass; the thresholds apply to that gradient.
    pub fn edge_mask(&self, frame: &RgbImage) -> GrayImage {
        let gray = to_gray(frame);
        let edges = canny(&gray, self.config.canny_low, self.config.canny_high);
        self.close_gaps(&edges)
    }

    /// Morphological closing with a square `morph_kernel` element.
    pub fn close_gaps(&self, edges: &GrayImage) -> GrayImage {
        let radius = (self.config.morph_kernel / 2).min(u8::MAX as u32) as u8;
        erode(&dilate(edges, Norm::LInf, radius), Norm::LInf, radius)
    }

    /// Union of the yellow and white HSV ranges.
    pub fn color_mask(&self, frame: &RgbImage) -> GrayImage {
        let (w, h) = frame.dimensions();
        let mut mask = GrayImage::new(w, h);
        for (x, y, p) in frame.enumerate_pixels() {
            let hsv = rgb_to_hsv(p[0], p[1], p[2]);
            if self.config.yellow.contains(hsv) || self.config.white.contains(hsv) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }
}

impl Segmenter for EdgeColorSegmenter {
    fn segment(&self, frame: &RgbImage) -> GrayImage {
        let edges = self.edge_mask(frame);
        let mut combined = self.color_mask(frame);
        for (out, edge) in combined.iter_mut().zip(edges.iter()) {
            *out |= *edge;
        }

        debug!(
            "Segmented {}x{} frame: {} lane candidates",
            frame.width(),
            frame.height(),
            combined.iter().filter(|&&v| v > 0).count()
        );
        combined
    }
}

// ============================================================================
// SATURATION + GRADIENT STRATEGY
// ============================================================================

pub struct SaturationGradientSegmenter {
    s_thresh: [u8; 2],
    sx_thresh: [u8; 2],
}

impl SaturationGradientSegmenter {
    pub fn new(s_thresh: [u8; 2], sx_thresh: [u8; 2]) -> Self {
        Self { s_thresh, sx_thresh }
    }
}

impl Segmenter for SaturationGradientSegmenter {
    fn segment(&self, frame: &RgbImage) -> GrayImage {
        let (w, h) = frame.dimensions();
        let (wu, hu) = (w as usize, h as usize);
        let mut mask = GrayImage::new(w, h);
        if wu == 0 || hu == 0 {
            return mask;
        }

        let mut l_channel = vec![0f32; wu * hu];
        let mut s_channel = vec![0u8; wu * hu];
        for (x, y, p) in frame.enumerate_pixels() {
            let (l, s) = rgb_to_ls(p[0], p[1], p[2]);
            let idx = y as usize * wu + x as usize;
            l_channel[idx] = l as f32;
            s_channel[idx] = s;
        }

        // Mixed second derivative: outer product of [-1, 0, 1] with itself.
        let at = |x: usize, y: usize| l_channel[y * wu + x];
        let mut response = vec![0f32; wu * hu];
        let mut max_response = 0f32;
        for y in 0..hu {
            let (y0, y1) = (y.saturating_sub(1), (y + 1).min(hu - 1));
            for x in 0..wu {
                let (x0, x1) = (x.saturating_sub(1), (x + 1).min(wu - 1));
                let v = (at(x0, y0) - at(x1, y0) - at(x0, y1) + at(x1, y1)).abs();
                response[y * wu + x] = v;
                max_response = max_response.max(v);
            }
        }

        for y in 0..hu {
            for x in 0..wu {
                let idx = y * wu + x;
                let scaled = if max_response > 0.0 {
                    (255.0 * response[idx] / max_response) as u8
                } else {
                    0
                };
                let gradient_hit = scaled >= self.sx_thresh[0] && scaled <= self.sx_thresh[1];
                let s = s_channel[idx];
                let saturation_hit = s >= self.s_thresh[0] && s <= self.s_thresh[1];
                if gradient_hit || saturation_hit {
                    mask.put_pixel(x as u32, y as u32, Luma([255]));
                }
            }
        }
        mask
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn asphalt(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([60, 60, 60]))
    }

    #[test]
    fn test_hsv_primary_colors() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(255, 255, 255), [0, 0, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn test_yellow_paint_in_range() {
        let config = SegmentationConfig::default();
        let hsv = rgb_to_hsv(230, 200, 40);
        assert!(config.yellow.contains(hsv), "paint yellow rejected: {:?}", hsv);
        assert!(!config.yellow.contains(rgb_to_hsv(60, 60, 60)));
    }

    #[test]
    fn test_white_needs_brightness() {
        let config = SegmentationConfig::default();
        assert!(config.white.contains(rgb_to_hsv(230, 230, 230)));
        assert!(!config.white.contains(rgb_to_hsv(150, 150, 150)));
    }

    #[test]
    fn test_uniform_road_yields_empty_mask() {
        let seg = EdgeColorSegmenter::new(SegmentationConfig::default());
        let mask = seg.segment(&asphalt(64, 48));
        assert_eq!(mask.dimensions(), (64, 48));
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_white_stripe_detected() {
        let mut frame = asphalt(80, 60);
        for y in 0..60 {
            for x in 30..36 {
                frame.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        let seg = EdgeColorSegmenter::new(SegmentationConfig::default());
        let mask = seg.segment(&frame);
        assert_eq!(mask.get_pixel(32, 30)[0], 255);
        assert_eq!(mask.get_pixel(5, 30)[0], 0, "plain asphalt must stay background");
        assert!(mask.iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn test_gray_step_found_by_edge_branch() {
        // 60 → 110 is neither white nor yellow; only the edge branch sees it.
        let frame = RgbImage::from_fn(80, 60, |x, _| {
            if x < 40 {
                Rgb([60, 60, 60])
            } else {
                Rgb([110, 110, 110])
            }
        });
        let seg = EdgeColorSegmenter::new(SegmentationConfig::default());
        assert!(seg.color_mask(&frame).iter().all(|&v| v == 0));

        let edges = seg.edge_mask(&frame);
        for y in [10, 30, 50] {
            assert!(
                (37..=42).any(|x| edges.get_pixel(x, y)[0] == 255),
                "no edge next to the step on row {}",
                y
            );
            assert_eq!(edges.get_pixel(10, y)[0], 0);
            assert_eq!(edges.get_pixel(70, y)[0], 0);
        }

        let mask = seg.segment(&frame);
        assert!((37..=42).any(|x| mask.get_pixel(x, 30)[0] == 255));
    }

    #[test]
    fn test_closing_bridges_short_edge_gap() {
        let mut edges = GrayImage::new(40, 60);
        for y in (0..60).filter(|y| !(28..30).contains(y)) {
            edges.put_pixel(20, y, Luma([255]));
        }
        let seg = EdgeColorSegmenter::new(SegmentationConfig::default());
        let closed = seg.close_gaps(&edges);
        assert_eq!(closed.get_pixel(20, 28)[0], 255);
        assert_eq!(closed.get_pixel(20, 29)[0], 255);
        assert_eq!(closed.get_pixel(25, 28)[0], 0);
    }

    #[test]
    fn test_yellow_stripe_detected_by_color_mask() {
        let mut frame = asphalt(40, 40);
        for y in 0..40 {
            frame.put_pixel(20, y, Rgb([230, 200, 40]));
        }
        let seg = EdgeColorSegmenter::new(SegmentationConfig::default());
        let mask = seg.color_mask(&frame);
        assert_eq!(mask.get_pixel(20, 10)[0], 255);
        assert_eq!(mask.get_pixel(10, 10)[0], 0);
    }

    #[test]
    fn test_saturation_gradient_flags_saturated_paint() {
        let mut frame = asphalt(40, 40);
        for y in 0..40 {
            for x in 10..14 {
                frame.put_pixel(x, y, Rgb([240, 190, 20]));
            }
        }
        let seg = SaturationGradientSegmenter::new([100, 255], [15, 255]);
        let mask = seg.segment(&frame);
        assert_eq!(mask.get_pixel(11, 20)[0], 255);
        assert_eq!(mask.get_pixel(30, 20)[0], 0);
    }

    #[test]
    fn test_build_segmenter_respects_mode() {
        let config = SegmentationConfig {
            mode: SegmentationMode::SaturationGradient,
            ..SegmentationConfig::default()
        };
        let seg = build_segmenter(&config);
        let mask = seg.segment(&asphalt(16, 16));
        assert!(mask.iter().all(|&v| v == 0));
    }
}
