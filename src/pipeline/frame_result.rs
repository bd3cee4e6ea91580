// src/pipeline/frame_result.rs
//
// Everything one frame produced, from the intermediate masks to the
// annotated output. Rendering and logging read from here instead of
// reaching back into the stages.

use image::{GrayImage, RgbImage};

use crate::tracking::LaneUpdate;
use crate::types::{CurveResult, TrackStatus};

#[derive(Debug, Clone)]
pub struct FrameResult {
    pub frame_id: u64,
    /// Undistorted frame with the lane area blended in.
    pub annotated: RgbImage,
    pub curve: CurveResult,
    pub update: LaneUpdate,
    /// Segmentation mask in camera perspective.
    pub mask: GrayImage,
    /// Segmentation mask in bird's-eye view, as fed to the tracker.
    pub birdseye: GrayImage,
}

impl FrameResult {
    pub fn status(&self) -> TrackStatus {
        self.update.status
    }

    /// Offset, or `None` while the tracker has nothing to report.
    pub fn offset(&self) -> Option<f64> {
        self.curve.has_estimate.then_some(self.curve.offset)
    }
}
