// src/lib.rs

pub mod compositor;
pub mod config;
pub mod curve_analyzer;
pub mod debug;
pub mod error;
pub mod perspective;
pub mod pipeline;
pub mod polyfit;
pub mod segmentation;
pub mod tracking;
pub mod types;
pub mod undistort;
pub mod video_processor;

pub use compositor::{Compositor, OverlayConfig};
pub use curve_analyzer::{CurveAnalyzer, WorldScale};
pub use error::{LaneError, Result};
pub use perspective::{Homography, PerspectiveConfig, Quad, Rectifier};
pub use pipeline::{process_frame, FrameResult, LanePipeline, PipelineMetrics};
pub use segmentation::{build_segmenter, Segmenter, SegmentationConfig, SegmentationMode};
pub use tracking::{LaneTracker, LaneTrackerConfig, LaneUpdate};
pub use types::{Config, CurveResult, LaneFit, TrackStatus};
pub use undistort::{CameraCalibration, IdentityUndistort, Undistort};
