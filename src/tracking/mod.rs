// src/tracking/mod.rs
//
// Lane boundary tracking on the bird's-eye mask.
//
// Signal flow:
//   bird's-eye mask → sliding_window search → per-frame LaneFit (left, right)
//                   → fit_history (bounded mean per side) → smoothed curves

mod fit_history;
mod lane_tracker;
mod sliding_window;

pub use fit_history::FitHistory;
pub use lane_tracker::{LaneTracker, LaneTrackerConfig, LaneUpdate};
pub use sliding_window::{search_lane_pixels, LanePixels, SearchTrace, SearchWindow};
