// src/pipeline/orchestrator.rs
//
// Per-frame stage sequencing:
//
//   raw ─▶ undistort ─▶ segment ─▶ rectify ─▶ track ─▶ analyze
//                │                                        │
//                └──────────────▶ composite ◀─────────────┘
//
// `LanePipeline` owns every stateful piece for one camera stream. The free
// function `process_frame` runs the same stages against caller-owned state.

use std::time::Instant;

use image::{GrayImage, RgbImage};
use tracing::{debug, info, warn};

use crate::compositor::Compositor;
use crate::curve_analyzer::CurveAnalyzer;
use crate::error::{LaneError, Result};
use crate::perspective::{PerspectiveConfig, Quad, Rectifier};
use crate::pipeline::frame_result::FrameResult;
use crate::pipeline::metrics::PipelineMetrics;
use crate::segmentation::{build_segmenter, Segmenter};
use crate::tracking::{LaneTracker, LaneUpdate};
use crate::types::{Config, CurveResult};
use crate::undistort::{IdentityUndistort, Undistort};

pub struct LanePipeline {
    config: Config,
    undistorter: Box<dyn Undistort>,
    segmenter: Box<dyn Segmenter>,
    /// Built on the first frame, once the frame size is known.
    rectifier: Option<Rectifier>,
    tracker: LaneTracker,
    analyzer: CurveAnalyzer,
    compositor: Compositor,
    metrics: PipelineMetrics,
    frame_id: u64,
}

impl LanePipeline {
    pub fn new(config: Config) -> Self {
        let undistorter: Box<dyn Undistort> = match config.calibration {
            Some(calibration) => Box::new(calibration),
            None => Box::new(IdentityUndistort),
        };

        info!(
            "Lane pipeline: {:?} segmentation, {} windows ±{}px, history {}",
            config.segmentation.mode,
            config.tracker.nwindows,
            config.tracker.margin,
            config.tracker.history_len
        );

        Self {
            undistorter,
            segmenter: build_segmenter(&config.segmentation),
            rectifier: None,
            tracker: LaneTracker::new(config.tracker.clone()),
            analyzer: CurveAnalyzer::new(config.world),
            compositor: Compositor::new(config.overlay.clone()),
            metrics: PipelineMetrics::new(),
            frame_id: 0,
            config,
        }
    }

    /// Replace the lens correction step.
    pub fn with_undistort(mut self, undistorter: Box<dyn Undistort>) -> Self {
        self.undistorter = undistorter;
        self
    }

    /// Replace the segmentation strategy.
    pub fn with_segmenter(mut self, segmenter: Box<dyn Segmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &LaneTracker {
        &self.tracker
    }

    pub fn rectifier(&self) -> Option<&Rectifier> {
        self.rectifier.as_ref()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_id
    }

    /// Start a new stream: forget lane history and the frame size.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.rectifier = None;
    }

    pub fn process_frame(&mut self, raw: &RgbImage) -> Result<FrameResult> {
        self.frame_id += 1;
        let frame_id = self.frame_id;

        match self.run(raw) {
            Ok(stages) => {
                self.metrics.record_status(stages.update.status);
                debug!(
                    "Frame {}: {} offset {:+.6} ({:+.1}px)",
                    frame_id,
                    stages.update.status.as_str(),
                    stages.curve.offset,
                    stages.curve.offset_px
                );
                Ok(FrameResult {
                    frame_id,
                    annotated: stages.annotated,
                    curve: stages.curve,
                    update: stages.update,
                    mask: stages.mask,
                    birdseye: stages.birdseye,
                })
            }
            Err(e) => {
                self.metrics.inc(&self.metrics.rejected_frames);
                warn!("Frame {} rejected: {}", frame_id, e);
                Err(e)
            }
        }
    }

    fn run(&mut self, raw: &RgbImage) -> Result<StageOutput> {
        let frame_size = raw.dimensions();
        let undistorted = self.undistorter.undistort(raw);
        if undistorted.dimensions() != frame_size {
            return Err(LaneError::shape("undistort", frame_size, undistorted.dimensions()));
        }

        let rectifier = ensure_rectifier(&mut self.rectifier, &self.config.perspective, frame_size)?;
        run_stages(
            undistorted,
            self.segmenter.as_ref(),
            rectifier,
            &mut self.tracker,
            &self.analyzer,
            &self.compositor,
            &self.metrics,
        )
    }
}

/// Run one frame against caller-owned tracker state.
///
/// Builds the segmenter and rectifier for this call; a long-running stream
/// should hold a [`LanePipeline`] instead.
pub fn process_frame(
    raw: &RgbImage,
    calibration: &dyn Undistort,
    roi: &Quad,
    tracker: &mut LaneTracker,
    config: &Config,
) -> Result<(RgbImage, CurveResult)> {
    let frame_size = raw.dimensions();
    let undistorted = calibration.undistort(raw);
    if undistorted.dimensions() != frame_size {
        return Err(LaneError::shape("undistort", frame_size, undistorted.dimensions()));
    }

    let rectifier = Rectifier::new(*roi, frame_size, config.perspective.birdseye_size(frame_size))?;
    let segmenter = build_segmenter(&config.segmentation);
    let stages = run_stages(
        undistorted,
        segmenter.as_ref(),
        &rectifier,
        tracker,
        &CurveAnalyzer::new(config.world),
        &Compositor::new(config.overlay.clone()),
        &PipelineMetrics::new(),
    )?;

    Ok((stages.annotated, stages.curve))
}

// ============================================================================
// STAGES
// ============================================================================

struct StageOutput {
    annotated: RgbImage,
    curve: CurveResult,
    update: LaneUpdate,
    mask: GrayImage,
    birdseye: GrayImage,
}

fn ensure_rectifier<'a>(
    slot: &'a mut Option<Rectifier>,
    perspective: &PerspectiveConfig,
    frame_size: (u32, u32),
) -> Result<&'a Rectifier> {
    let rectifier = match slot.take() {
        Some(existing) => existing,
        None => {
            let birdseye_size = perspective.birdseye_size(frame_size);
            let built = Rectifier::new(perspective.roi, frame_size, birdseye_size)?;
            info!(
                "Rectifier built for {}x{} frames → {}x{} bird's-eye",
                frame_size.0, frame_size.1, birdseye_size.0, birdseye_size.1
            );
            built
        }
    };

    let rectifier = slot.insert(rectifier);
    if rectifier.frame_size() != frame_size {
        return Err(LaneError::shape("rectifier", rectifier.frame_size(), frame_size));
    }
    Ok(&*rectifier)
}

#[allow(clippy::too_many_arguments)]
fn run_stages(
    undistorted: RgbImage,
    segmenter: &dyn Segmenter,
    rectifier: &Rectifier,
    tracker: &mut LaneTracker,
    analyzer: &CurveAnalyzer,
    compositor: &Compositor,
    metrics: &PipelineMetrics,
) -> Result<StageOutput> {
    let t = Instant::now();
    let mask = segmenter.segment(&undistorted);
    metrics.set_timing(&metrics.segment_time_us, t);

    let t = Instant::now();
    let birdseye = rectifier.forward(&mask)?;
    metrics.set_timing(&metrics.warp_time_us, t);

    let t = Instant::now();
    let update = tracker.update(&birdseye)?;
    let (bw, bh) = birdseye.dimensions();
    let curve = analyzer.analyze(&update.plot_y, &update.left_x, &update.right_x, bh, bw)?;
    metrics.set_timing(&metrics.track_time_us, t);

    let t = Instant::now();
    let annotated = compositor.render_with(
        &undistorted,
        &update.left_x,
        &update.right_x,
        &update.plot_y,
        rectifier,
    )?;
    metrics.set_timing(&metrics.composite_time_us, t);

    Ok(StageOutput {
        annotated,
        curve,
        update,
        mask,
        birdseye,
    })
}

// ============================================================================
// TESTS
// ============================================================================
