// src/pipeline/metrics.rs
//
// Per-session counters and last-frame stage timings. Shared handles so a
// reporting thread can read while the pipeline runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::types::TrackStatus;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub tracking_frames: Arc<AtomicU64>,
    pub coasting_frames: Arc<AtomicU64>,
    pub no_estimate_frames: Arc<AtomicU64>,
    pub rejected_frames: Arc<AtomicU64>,
    pub segment_time_us: Arc<AtomicU64>,
    pub warp_time_us: Arc<AtomicU64>,
    pub track_time_us: Arc<AtomicU64>,
    pub composite_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            tracking_frames: Arc::new(AtomicU64::new(0)),
            coasting_frames: Arc::new(AtomicU64::new(0)),
            no_estimate_frames: Arc::new(AtomicU64::new(0)),
            rejected_frames: Arc::new(AtomicU64::new(0)),
            segment_time_us: Arc::new(AtomicU64::new(0)),
            warp_time_us: Arc::new(AtomicU64::new(0)),
            track_time_us: Arc::new(AtomicU64::new(0)),
            composite_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, since: Instant) {
        counter.store(since.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_status(&self, status: TrackStatus) {
        self.inc(&self.total_frames);
        match status {
            TrackStatus::Tracking => self.inc(&self.tracking_frames),
            TrackStatus::Coasting => self.inc(&self.coasting_frames),
            TrackStatus::NoEstimate => self.inc(&self.no_estimate_frames),
        }
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            tracking_frames: self.tracking_frames.load(Ordering::Relaxed),
            coasting_frames: self.coasting_frames.load(Ordering::Relaxed),
            no_estimate_frames: self.no_estimate_frames.load(Ordering::Relaxed),
            rejected_frames: self.rejected_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            last_segment_us: self.segment_time_us.load(Ordering::Relaxed),
            last_warp_us: self.warp_time_us.load(Ordering::Relaxed),
            last_track_us: self.track_time_us.load(Ordering::Relaxed),
            last_composite_us: self.composite_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub tracking_frames: u64,
    pub coasting_frames: u64,
    pub no_estimate_frames: u64,
    pub rejected_frames: u64,
    pub fps: f64,
    pub last_segment_us: u64,
    pub last_warp_us: u64,
    pub last_track_us: u64,
    pub last_composite_us: u64,
    pub elapsed_secs: f64,
}
