// src/error.rs

use thiserror::Error;

/// Failures the per-frame pipeline reports to its caller.
///
/// Empty detections and missing history are NOT errors; the tracker and
/// analyzer report those through their status fields instead.
#[derive(Debug, Error)]
pub enum LaneError {
    /// Frame dimensions disagree between two stages. Fatal for the frame.
    #[error("shape mismatch in {stage}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        stage: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// Sampled curves do not line up with their y-sequence.
    #[error("curve length mismatch in {stage}: plot_y has {expected} samples, curve has {actual}")]
    CurveLengthMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The four quad corners do not define a projective transform.
    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(&'static str),
}

impl LaneError {
    pub(crate) fn shape(stage: &'static str, expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::ShapeMismatch {
            stage,
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, LaneError>;
