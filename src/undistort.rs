// src/undistort.rs
//
// Lens distortion removal ahead of segmentation.
//
// `CameraCalibration` carries the pinhole matrix and Brown–Conrady
// coefficients produced by an offline checkerboard calibration. Undistortion
// keeps the same camera matrix for the output, so frame size and principal
// point are unchanged: every output pixel is projected through the
// distortion model and sampled (nearest) from the raw frame.

use image::RgbImage;
use serde::{Deserialize, Serialize};

pub trait Undistort: Send {
    fn undistort(&self, frame: &RgbImage) -> RgbImage;
}

/// Pass-through for cameras without a calibration record.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityUndistort;

impl Undistort for IdentityUndistort {
    fn undistort(&self, frame: &RgbImage) -> RgbImage {
        frame.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub k1: f64,
    #[serde(default)]
    pub k2: f64,
    #[serde(default)]
    pub p1: f64,
    #[serde(default)]
    pub p2: f64,
    #[serde(default)]
    pub k3: f64,
}

impl CameraCalibration {
    /// Ideal pinhole camera centred on a frame of the given size.
    pub fn pinhole(width: u32, height: u32, focal: f64) -> Self {
        Self {
            fx: focal,
            fy: focal,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            k1: 0.0,
            k2: 0.0,
            p1: 0.0,
            p2: 0.0,
            k3: 0.0,
        }
    }

    pub fn is_distortion_free(&self) -> bool {
        [self.k1, self.k2, self.p1, self.p2, self.k3].iter().all(|k| *k == 0.0)
    }

    /// Pixel in the raw (distorted) frame that lands on undistorted `(u, v)`.
    pub fn distort_point(&self, u: f64, v: f64) -> [f64; 2] {
        let x = (u - self.cx) / self.fx;
        let y = (v - self.cy) / self.fy;
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xd = x * radial + 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [self.fx * xd + self.cx, self.fy * yd + self.cy]
    }
}

impl Undistort for CameraCalibration {
    fn undistort(&self, frame: &RgbImage) -> RgbImage {
        if self.is_distortion_free() {
            return frame.clone();
        }

        let (w, h) = frame.dimensions();
        RgbImage::from_fn(w, h, |u, v| {
            let [sx, sy] = self.distort_point(u as f64, v as f64);
            let (sx, sy) = (sx.round(), sy.round());
            if sx < 0.0 || sy < 0.0 || sx >= w as f64 || sy >= h as f64 || !sx.is_finite() || !sy.is_finite() {
                return image::Rgb([0, 0, 0]);
            }
            *frame.get_pixel(sx as u32, sy as u32)
        })
    }
}
