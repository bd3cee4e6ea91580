// src/curve_analyzer.rs
//
// Pixel-space lane curves → real-world lane position.
//
// Both sampled curves are refitted after scaling x and y to world units,
// evaluated at the bottom row, and compared with the frame centre. The scale
// factors are calibration constants tied to the rectification quad; they are
// configurable because they only hold for the camera setup they were chosen
// for.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LaneError, Result};
use crate::polyfit::fit_quadratic;
use crate::types::CurveResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldScale {
    /// World width covered by a frame-height worth of bird's-eye pixels.
    pub x_span: f64,
    /// World length covered by the bird's-eye frame height.
    pub y_span: f64,
    /// Final divisor applied to the scaled centre offset.
    pub offset_divisor: f64,
}

impl Default for WorldScale {
    fn default() -> Self {
        Self {
            x_span: 0.1,
            y_span: 1.0,
            offset_divisor: 10.0,
        }
    }
}

impl WorldScale {
    /// World units per pixel along x and y for a given frame height.
    pub fn per_pixel(&self, frame_height: u32) -> (f64, f64) {
        let h = frame_height.max(1) as f64;
        (self.x_span / h, self.y_span / h)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurveAnalyzer {
    scale: WorldScale,
}

impl CurveAnalyzer {
    pub fn new(scale: WorldScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> &WorldScale {
        &self.scale
    }

    /// Real-world intercepts and lateral offset for one frame.
    ///
    /// Empty curves (no tracker estimate yet) give a zero result with
    /// `has_estimate = false`. Curves whose length differs from `plot_y`
    /// are rejected.
    pub fn analyze(
        &self,
        plot_y: &[f64],
        left_x: &[f64],
        right_x: &[f64],
        frame_height: u32,
        frame_width: u32,
    ) -> Result<CurveResult> {
        for curve in [left_x, right_x] {
            if curve.len() != plot_y.len() {
                return Err(LaneError::CurveLengthMismatch {
                    stage: "curve analyzer",
                    expected: plot_y.len(),
                    actual: curve.len(),
                });
            }
        }
        if plot_y.is_empty() || frame_height == 0 {
            return Ok(CurveResult::default());
        }

        let (x_scale, y_scale) = self.scale.per_pixel(frame_height);
        let ys: Vec<f64> = plot_y.iter().map(|y| y * y_scale).collect();
        let to_world = |xs: &[f64]| -> Vec<f64> { xs.iter().map(|x| x * x_scale).collect() };

        let (Some(left), Some(right)) = (
            fit_quadratic(&ys, &to_world(left_x)),
            fit_quadratic(&ys, &to_world(right_x)),
        ) else {
            return Ok(CurveResult::default());
        };

        let y_eval = plot_y.iter().fold(f64::NEG_INFINITY, |m, &y| m.max(y)) * y_scale;
        let left_x_real = left.eval(y_eval);
        let right_x_real = right.eval(y_eval);

        let lane_center_px = (left_x_real + right_x_real) / 2.0 / x_scale;
        let offset_px = frame_width as f64 / 2.0 - lane_center_px;
        let offset = offset_px * x_scale / self.scale.offset_divisor;

        debug!(
            "Lane intercepts L={:.5} R={:.5}, centre {:.1}px, offset {:+.6}",
            left_x_real, right_x_real, lane_center_px, offset
        );

        Ok(CurveResult {
            left_x_real,
            right_x_real,
            offset,
            offset_px,
            has_estimate: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LaneFit;

    fn plot(h: u32) -> Vec<f64> {
        (0..h).map(|y| y as f64).collect()
    }

    #[test]
    fn test_mirrored_lanes_have_zero_offset() {
        let y = plot(720);
        let left = LaneFit::new(3e-4, -0.4, 420.0).sample(&y);
        let right: Vec<f64> = left.iter().map(|x| 1280.0 - x).collect();
        let result = CurveAnalyzer::default()
            .analyze(&y, &left, &right, 720, 1280)
            .unwrap();
        assert!(result.has_estimate);
        assert!(result.offset.abs() < 1e-12, "offset = {}", result.offset);
        assert!(result.offset_px.abs() < 1e-6);
    }

    #[test]
    fn test_straight_stripes_end_to_end_values() {
        let y = plot(300);
        let left = vec![200.0; 300];
        let right = vec![800.0; 300];
        let result = CurveAnalyzer::default()
            .analyze(&y, &left, &right, 300, 1000)
            .unwrap();
        let x_scale = 0.1 / 300.0;
        assert!((result.left_x_real - 200.0 * x_scale).abs() < 1e-9);
        assert!((result.right_x_real - 800.0 * x_scale).abs() < 1e-9);
        assert!(result.offset.abs() < 1e-12);
    }

    #[test]
    fn test_offset_sign_follows_lane_shift() {
        let y = plot(300);
        // Lane centre at 450px, frame centre at 500px: vehicle sits right.
        let left = vec![150.0; 300];
        let right = vec![750.0; 300];
        let result = CurveAnalyzer::default()
            .analyze(&y, &left, &right, 300, 1000)
            .unwrap();
        assert!(result.offset > 0.0);
        assert!((result.offset_px - 50.0).abs() < 1e-6);
        let expected = 50.0 * (0.1 / 300.0) / 10.0;
        assert!((result.offset - expected).abs() < 1e-12);
    }

    #[test]
    fn test_intercept_uses_bottom_row() {
        let y = plot(100);
        let left = LaneFit::new(0.0, 1.0, 0.0).sample(&y);
        let right = LaneFit::new(0.0, 1.0, 500.0).sample(&y);
        let result = CurveAnalyzer::default()
            .analyze(&y, &left, &right, 100, 600)
            .unwrap();
        let x_scale = 0.1 / 100.0;
        assert!((result.left_x_real - 99.0 * x_scale).abs() < 1e-9);
        assert!((result.right_x_real - 599.0 * x_scale).abs() < 1e-9);
    }

    #[test]
    fn test_empty_curves_have_no_estimate() {
        let result = CurveAnalyzer::default().analyze(&[], &[], &[], 300, 1000).unwrap();
        assert!(!result.has_estimate);
        assert_eq!(result.offset, 0.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = CurveAnalyzer::default()
            .analyze(&plot(10), &[1.0; 10], &[1.0; 9], 10, 100)
            .unwrap_err();
        assert!(matches!(err, LaneError::CurveLengthMismatch { .. }));
    }

    #[test]
    fn test_custom_scale() {
        let scale = WorldScale {
            x_span: 3.7,
            y_span: 30.0,
            offset_divisor: 1.0,
        };
        let y = plot(200);
        let result = CurveAnalyzer::new(scale)
            .analyze(&y, &vec![100.0; 200], &vec![260.0; 200], 200, 400)
            .unwrap();
        // centre 180px vs frame centre 200px → 20px * 3.7/200.
        assert!((result.offset - 20.0 * 3.7 / 200.0).abs() < 1e-9);
    }
}
