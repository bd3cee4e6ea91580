// src/tracking/lane_tracker.rs
//
// Stateful lane tracker: one instance per video stream.
//
// Each update runs the sliding-window search, fits x = a·y² + b·y + c to the
// pixels collected for each side and, when BOTH sides produced pixels,
// appends the fits to that side's bounded history. The smoothed output is
// the per-coefficient mean over the retained history.
//
// A frame where either side is empty is a miss: history is left untouched
// and the previous smoothed fit is returned again. With no history at all,
// the update is degenerate (zero fits, empty curves).

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::fit_history::FitHistory;
use super::sliding_window::{search_lane_pixels, SearchTrace};
use crate::error::{LaneError, Result};
use crate::polyfit::fit_quadratic;
use crate::types::{LaneFit, TrackStatus};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneTrackerConfig {
    /// Number of horizontal bands scanned bottom → top.
    pub nwindows: usize,
    /// Half-width of each search window in pixels.
    pub margin: u32,
    /// A window re-centres only when it holds MORE than this many pixels.
    pub minpix: usize,
    /// Fits retained per side for smoothing.
    pub history_len: usize,
}

impl Default for LaneTrackerConfig {
    fn default() -> Self {
        Self {
            nwindows: 15,
            margin: 50,
            minpix: 1,
            history_len: 10,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Result of one tracker update.
#[derive(Debug, Clone)]
pub struct LaneUpdate {
    pub status: TrackStatus,
    /// Smoothed left boundary.
    pub left_fit: LaneFit,
    /// Smoothed right boundary.
    pub right_fit: LaneFit,
    /// This frame's unsmoothed fits, when both sides were found.
    pub frame_fit: Option<(LaneFit, LaneFit)>,
    /// Smoothed left curve sampled at `plot_y`.
    pub left_x: Vec<f64>,
    /// Smoothed right curve sampled at `plot_y`.
    pub right_x: Vec<f64>,
    /// 0, 1, …, height − 1. Empty when there is no estimate.
    pub plot_y: Vec<f64>,
    pub trace: SearchTrace,
}

impl LaneUpdate {
    pub fn has_estimate(&self) -> bool {
        self.status != TrackStatus::NoEstimate
    }
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct LaneTracker {
    config: LaneTrackerConfig,
    left: FitHistory,
    right: FitHistory,
    /// Mask size of the first update; history is only valid in that space.
    frame_size: Option<(u32, u32)>,
    total_updates: u64,
    total_misses: u64,
}

impl LaneTracker {
    pub fn new(config: LaneTrackerConfig) -> Self {
        let history_len = config.history_len;
        Self {
            config,
            left: FitHistory::new(history_len),
            right: FitHistory::new(history_len),
            frame_size: None,
            total_updates: 0,
            total_misses: 0,
        }
    }

    pub fn config(&self) -> &LaneTrackerConfig {
        &self.config
    }

    pub fn left_history(&self) -> &FitHistory {
        &self.left
    }

    pub fn right_history(&self) -> &FitHistory {
        &self.right
    }

    /// Current smoothed fits, if any frame has been fitted.
    pub fn smoothed(&self) -> Option<(LaneFit, LaneFit)> {
        Some((self.left.mean()?, self.right.mean()?))
    }

    pub fn miss_count(&self) -> u64 {
        self.total_misses
    }

    /// Forget history and the remembered frame size.
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.frame_size = None;
        info!(
            "Lane tracker reset after {} updates ({} misses)",
            self.total_updates, self.total_misses
        );
    }

    /// Process one binary bird's-eye mask.
    pub fn update(&mut self, mask: &GrayImage) -> Result<LaneUpdate> {
        let size = mask.dimensions();
        match self.frame_size {
            Some(expected) if expected != size => {
                warn!("Tracker fed a {:?} mask after {:?} frames", size, expected);
                return Err(LaneError::shape("lane tracker", expected, size));
            }
            Some(_) => {}
            None => self.frame_size = Some(size),
        }
        self.total_updates += 1;

        let trace = search_lane_pixels(mask, self.config.nwindows, self.config.margin, self.config.minpix);

        let frame_fit = if trace.left.is_empty() || trace.right.is_empty() {
            None
        } else {
            fit_quadratic(&trace.left.ys(), &trace.left.xs())
                .zip(fit_quadratic(&trace.right.ys(), &trace.right.xs()))
        };

        let status = match frame_fit {
            Some((left_fit, right_fit)) => {
                self.left.push(left_fit);
                self.right.push(right_fit);
                debug!(
                    "Fitted L=({:.3e}, {:.3}, {:.1}) from {} px, R=({:.3e}, {:.3}, {:.1}) from {} px",
                    left_fit.a,
                    left_fit.b,
                    left_fit.c,
                    trace.left.len(),
                    right_fit.a,
                    right_fit.b,
                    right_fit.c,
                    trace.right.len()
                );
                TrackStatus::Tracking
            }
            None => {
                self.total_misses += 1;
                debug!(
                    "Tracking miss: left {} px, right {} px (history {})",
                    trace.left.len(),
                    trace.right.len(),
                    self.left.len()
                );
                if self.left.is_empty() {
                    TrackStatus::NoEstimate
                } else {
                    TrackStatus::Coasting
                }
            }
        };

        let Some((left_fit, right_fit)) = self.smoothed() else {
            return Ok(LaneUpdate {
                status: TrackStatus::NoEstimate,
                left_fit: LaneFit::default(),
                right_fit: LaneFit::default(),
                frame_fit: None,
                left_x: Vec::new(),
                right_x: Vec::new(),
                plot_y: Vec::new(),
                trace,
            });
        };

        let plot_y: Vec<f64> = (0..size.1).map(|y| y as f64).collect();
        Ok(LaneUpdate {
            status,
            left_fit,
            right_fit,
            frame_fit,
            left_x: left_fit.sample(&plot_y),
            right_x: right_fit.sample(&plot_y),
            plot_y,
            trace,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
