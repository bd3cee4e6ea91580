// src/types.rs

use serde::{Deserialize, Serialize};

use crate::compositor::OverlayConfig;
use crate::curve_analyzer::WorldScale;
use crate::perspective::PerspectiveConfig;
use crate::segmentation::SegmentationConfig;
use crate::tracking::LaneTrackerConfig;
use crate::undistort::CameraCalibration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segmentation: SegmentationConfig,
    pub perspective: PerspectiveConfig,
    pub tracker: LaneTrackerConfig,
    pub world: WorldScale,
    pub overlay: OverlayConfig,
    /// Lens calibration. Frames pass through unchanged when absent.
    pub calibration: Option<CameraCalibration>,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub save_annotated: bool,
    /// Also write the bird's-eye search visualization per frame.
    pub save_debug: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "frames".to_string(),
            output_dir: "output".to_string(),
            save_annotated: true,
            save_debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive scoped to this crate.
    pub fn filter_directive(&self) -> String {
        format!("lane_finder={}", self.level)
    }
}

/// Second-degree lane boundary in pixel space: x = a·y² + b·y + c.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LaneFit {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    #[inline]
    pub fn eval(&self, y: f64) -> f64 {
        (self.a * y + self.b) * y + self.c
    }

    /// Evaluate the polynomial at every y in `plot_y`.
    pub fn sample(&self, plot_y: &[f64]) -> Vec<f64> {
        plot_y.iter().map(|&y| self.eval(y)).collect()
    }
}

/// Outcome of one tracker update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Both sides found pixels; history was extended.
    Tracking,
    /// One side was empty; previous smoothed fit reused.
    Coasting,
    /// Nothing found and no history to fall back on.
    NoEstimate,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracking => "TRACKING",
            Self::Coasting => "COASTING",
            Self::NoEstimate => "NO_ESTIMATE",
        }
    }
}

/// Real-world lane position for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveResult {
    /// Left boundary x at the bottom row, world units.
    pub left_x_real: f64,
    /// Right boundary x at the bottom row, world units.
    pub right_x_real: f64,
    /// Signed lateral offset. Positive when the frame centre lies right of
    /// the lane centre.
    pub offset: f64,
    /// Frame centre minus lane centre, bird's-eye pixels.
    pub offset_px: f64,
    /// False when the offset was computed from an empty fit. A zero offset
    /// without an estimate means "unknown", not "centred".
    pub has_estimate: bool,
}
