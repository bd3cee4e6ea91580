// src/perspective.rs
//
// Bird's-eye rectification of the road plane.
//
// A trapezoidal region of interest in the camera frame is mapped onto the
// full rectangle of the bird's-eye frame by an exact 4-point homography.
// Quads are stored in normalized [0,1]² coordinates and scaled to pixel
// sizes when the matrix is built, so the same ROI works for any resolution.
//
// Corner order everywhere: top-left, top-right, bottom-left, bottom-right.
//
// Sampling is nearest-neighbour in both directions. Destination pixels whose
// pre-image falls outside the source are left at zero.

use image::{ImageBuffer, Pixel};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LaneError, Result};

// ============================================================================
// QUADRILATERALS
// ============================================================================

/// Four corners in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [[f64; 2]; 4]);

impl Quad {
    /// The whole frame.
    pub const UNIT: Quad = Quad([[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);

    /// Lower-middle road trapezoid for a forward-facing dash camera.
    pub const DEFAULT_ROI: Quad = Quad([[0.43, 0.65], [0.58, 0.65], [0.10, 1.0], [1.0, 1.0]]);

    /// Build the ROI trapezoid from calibration-style percentages: inset of
    /// the top/bottom edges from each side and their heights, all in 0..100.
    pub fn trapezoid(width_top: f64, height_top: f64, width_bottom: f64, height_bottom: f64) -> Self {
        let wt = width_top / 100.0;
        let ht = height_top / 100.0;
        let wb = width_bottom / 100.0;
        let hb = height_bottom / 100.0;
        Quad([[wt, ht], [1.0 - wt, ht], [wb, hb], [1.0 - wb, hb]])
    }

    /// Corners scaled to a pixel size.
    pub fn scaled(&self, (width, height): (u32, u32)) -> [[f64; 2]; 4] {
        let (w, h) = (width as f64, height as f64);
        self.0.map(|[x, y]| [x * w, y * h])
    }
}

impl Default for Quad {
    fn default() -> Self {
        Self::DEFAULT_ROI
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Road region in the camera frame.
    pub roi: Quad,
    /// Bird's-eye frame size; the camera frame size is used when unset.
    pub birdseye_width: Option<u32>,
    pub birdseye_height: Option<u32>,
}

impl PerspectiveConfig {
    pub fn birdseye_size(&self, frame_size: (u32, u32)) -> (u32, u32) {
        (
            self.birdseye_width.unwrap_or(frame_size.0),
            self.birdseye_height.unwrap_or(frame_size.1),
        )
    }
}

// ============================================================================
// HOMOGRAPHY
// ============================================================================

/// Projective map from `src` (scaled to `src_size`) onto `dst` (scaled to
/// `dst_size`).
#[derive(Debug, Clone)]
pub struct Homography {
    pub matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
    pub src: Quad,
    pub dst: Quad,
    pub src_size: (u32, u32),
    pub dst_size: (u32, u32),
}

impl Homography {
    /// Solve the exact 4-point correspondence with h33 fixed to 1.
    pub fn between(src: Quad, src_size: (u32, u32), dst: Quad, dst_size: (u32, u32)) -> Result<Self> {
        let s = src.scaled(src_size);
        let d = dst.scaled(dst_size);

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let [x, y] = s[i];
            let [u, v] = d[i];
            let r0 = 2 * i;
            let r1 = r0 + 1;

            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = 1.0;
            a[(r0, 6)] = -u * x;
            a[(r0, 7)] = -u * y;
            b[r0] = u;

            a[(r1, 3)] = x;
            a[(r1, 4)] = y;
            a[(r1, 5)] = 1.0;
            a[(r1, 6)] = -v * x;
            a[(r1, 7)] = -v * y;
            b[r1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or(LaneError::DegenerateQuad("corner system is singular"))?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(LaneError::DegenerateQuad("non-finite homography"));
        }

        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        let inverse = matrix
            .try_inverse()
            .ok_or(LaneError::DegenerateQuad("homography is not invertible"))?;

        debug!(
            "Homography {:?}@{:?} -> {:?}@{:?}",
            src.0, src_size, dst.0, dst_size
        );

        Ok(Self {
            matrix,
            inverse,
            src,
            dst,
            src_size,
            dst_size,
        })
    }

    /// Map a source pixel coordinate to the destination frame.
    pub fn map_point(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        project(&self.matrix, x, y)
    }

    /// Warp `image` into a new buffer of `dst_size`.
    pub fn warp<P>(&self, image: &ImageBuffer<P, Vec<P::Subpixel>>) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
    where
        P: Pixel + 'static,
    {
        if image.dimensions() != self.src_size {
            return Err(LaneError::shape("perspective warp", self.src_size, image.dimensions()));
        }

        let (src_w, src_h) = self.src_size;
        let (dst_w, dst_h) = self.dst_size;
        let mut out = ImageBuffer::<P, Vec<P::Subpixel>>::new(dst_w, dst_h);

        for v in 0..dst_h {
            for u in 0..dst_w {
                let Some([sx, sy]) = project(&self.inverse, u as f64, v as f64) else {
                    continue;
                };
                let sx = sx.round();
                let sy = sy.round();
                if sx < 0.0 || sy < 0.0 || sx >= src_w as f64 || sy >= src_h as f64 {
                    continue;
                }
                out.put_pixel(u, v, *image.get_pixel(sx as u32, sy as u32));
            }
        }

        Ok(out)
    }
}

#[inline]
fn project(h: &Matrix3<f64>, x: f64, y: f64) -> Option<[f64; 2]> {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-12 || !p[0].is_finite() || !p[1].is_finite() {
        return None;
    }
    Some([p[0] / p[2], p[1] / p[2]])
}

// ============================================================================
// RECTIFIER
// ============================================================================

/// Forward (road → bird's-eye) and inverse (bird's-eye → road) warps built
/// from reciprocal quad pairs.
#[derive(Debug, Clone)]
pub struct Rectifier {
    forward: Homography,
    inverse: Homography,
}

impl Rectifier {
    pub fn new(roi: Quad, frame_size: (u32, u32), birdseye_size: (u32, u32)) -> Result<Self> {
        let forward = Homography::between(roi, frame_size, Quad::UNIT, birdseye_size)?;
        let inverse = Homography::between(Quad::UNIT, birdseye_size, roi, frame_size)?;
        Ok(Self { forward, inverse })
    }

    pub fn roi(&self) -> Quad {
        self.forward.src
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.forward.src_size
    }

    pub fn birdseye_size(&self) -> (u32, u32) {
        self.forward.dst_size
    }

    pub fn forward_homography(&self) -> &Homography {
        &self.forward
    }

    pub fn inverse_homography(&self) -> &Homography {
        &self.inverse
    }

    /// Camera frame (or mask) → bird's-eye view.
    pub fn forward<P>(&self, image: &ImageBuffer<P, Vec<P::Subpixel>>) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
    where
        P: Pixel + 'static,
    {
        self.forward.warp(image)
    }

    /// Bird's-eye view → camera perspective.
    pub fn inverse<P>(&self, image: &ImageBuffer<P, Vec<P::Subpixel>>) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
    where
        P: Pixel + 'static,
    {
        self.inverse.warp(image)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gradient_frame(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x * 255 / (w - 1)) as u8,
                (y * 255 / (h - 1)) as u8,
                ((x + y) * 255 / (w + h - 2)) as u8,
            ])
        })
    }

    #[test]
    fn test_homography_maps_corners_exactly() {
        let h = Homography::between(Quad::DEFAULT_ROI, (1280, 720), Quad::UNIT, (1280, 720)).unwrap();
        let src = Quad::DEFAULT_ROI.scaled((1280, 720));
        let dst = Quad::UNIT.scaled((1280, 720));
        for (s, d) in src.iter().zip(dst.iter()) {
            let p = h.map_point(s[0], s[1]).unwrap();
            assert!((p[0] - d[0]).abs() < 1e-6, "x: {} vs {}", p[0], d[0]);
            assert!((p[1] - d[1]).abs() < 1e-6, "y: {} vs {}", p[1], d[1]);
        }
    }

    #[test]
    fn test_forward_inverse_compose_to_identity() {
        let r = Rectifier::new(Quad::DEFAULT_ROI, (640, 360), (640, 360)).unwrap();
        let composed = r.inverse_homography().matrix * r.forward_homography().matrix;
        let composed = composed / composed[(2, 2)];
        let identity = Matrix3::<f64>::identity();
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (composed[(i, j)] - identity[(i, j)]).abs() < 1e-9,
                    "entry ({}, {}) = {}",
                    i,
                    j,
                    composed[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_point_round_trip_with_different_birdseye_size() {
        let r = Rectifier::new(Quad::DEFAULT_ROI, (1280, 720), (400, 800)).unwrap();
        for &(x, y) in &[(700.0, 500.0), (300.0, 719.0), (1100.0, 650.0)] {
            let b = r.forward_homography().map_point(x, y).unwrap();
            let back = r.inverse_homography().map_point(b[0], b[1]).unwrap();
            assert!((back[0] - x).abs() < 1e-6 && (back[1] - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_round_trip_reproduces_frame_inside_roi() {
        let (w, h) = (200, 120);
        let frame = gradient_frame(w, h);
        let r = Rectifier::new(Quad::DEFAULT_ROI, (w, h), (w, h)).unwrap();

        let birdseye = r.forward(&frame).unwrap();
        let back = r.inverse(&birdseye).unwrap();
        assert_eq!(back.dimensions(), frame.dimensions());

        let mut checked = 0;
        for y in 0..h {
            for x in 0..w {
                // Only pixels well inside the ROI survive the round trip.
                let p = r.forward_homography().map_point(x as f64, y as f64).unwrap();
                let (u, v) = (p[0] / w as f64, p[1] / h as f64);
                if !(0.05..=0.95).contains(&u) || !(0.05..=0.95).contains(&v) {
                    continue;
                }
                let a = frame.get_pixel(x, y);
                let b = back.get_pixel(x, y);
                for c in 0..3 {
                    let diff = (a[c] as i32 - b[c] as i32).abs();
                    assert!(diff <= 8, "pixel ({}, {}) ch{} differs by {}", x, y, c, diff);
                }
                checked += 1;
            }
        }
        assert!(checked > 500, "too few ROI pixels checked: {}", checked);
    }

    #[test]
    fn test_warp_works_on_masks() {
        let mut mask = GrayImage::new(100, 100);
        for y in 70..100 {
            mask.put_pixel(50, y, Luma([255]));
        }
        let r = Rectifier::new(Quad([[0.2, 0.6], [0.8, 0.6], [0.2, 1.0], [0.8, 1.0]]), (100, 100), (100, 100))
            .unwrap();
        let birdseye = r.forward(&mask).unwrap();
        let positives = birdseye.pixels().filter(|p| p[0] > 0).count();
        assert!(positives > 0, "stripe should survive rectification");
    }

    #[test]
    fn test_wrong_input_size_is_rejected() {
        let r = Rectifier::new(Quad::DEFAULT_ROI, (100, 100), (100, 100)).unwrap();
        let err = r.forward(&GrayImage::new(50, 100)).unwrap_err();
        assert!(matches!(err, LaneError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_collapsed_quad_is_degenerate() {
        let collapsed = Quad([[0.5, 0.5]; 4]);
        let err = Homography::between(collapsed, (100, 100), Quad::UNIT, (100, 100)).unwrap_err();
        assert!(matches!(err, LaneError::DegenerateQuad(_)));
    }

    #[test]
    fn test_trapezoid_from_percentages() {
        let q = Quad::trapezoid(43.0, 65.0, 10.0, 100.0);
        assert!((q.0[0][0] - 0.43).abs() < 1e-12);
        assert!((q.0[1][0] - 0.57).abs() < 1e-12);
        assert!((q.0[3][1] - 1.0).abs() < 1e-12);
    }
}
