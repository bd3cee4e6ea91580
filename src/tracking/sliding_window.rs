// src/tracking/sliding_window.rs
//
// Sliding-window lane pixel search.
//
// 1. Column histogram of the bottom half seeds one x-position per side
//    (peak of the left half, peak of the right half).
// 2. The image is cut into `nwindows` equal bands, scanned bottom → top.
//    Each band opens a window of ±margin around the current x-estimate and
//    collects the positive pixels inside it.
// 3. A window holding more than `minpix` pixels re-centres the next band on
//    their mean x; otherwise the previous centre carries forward.
//
// Carry-forward makes the search tolerant of dashed markings but lets it
// drift across long gaps.

use image::GrayImage;

/// One search window. Columns are signed because windows may hang over the
/// image edge; rows are `[y_low, y_high)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub x_low: i64,
    pub x_high: i64,
    pub y_low: u32,
    pub y_high: u32,
    /// Positive pixels collected by this window.
    pub hits: usize,
}

/// Pixel coordinates `(x, y)` assigned to one lane side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanePixels {
    pub points: Vec<(u32, u32)>,
}

impl LanePixels {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|&(x, _)| x as f64).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|&(_, y)| y as f64).collect()
    }
}

/// Everything the search saw on one frame. Feeds both the fit and the
/// optional diagnostic rendering.
#[derive(Debug, Clone, Default)]
pub struct SearchTrace {
    pub left_base: u32,
    pub right_base: u32,
    pub left_windows: Vec<SearchWindow>,
    pub right_windows: Vec<SearchWindow>,
    pub left: LanePixels,
    pub right: LanePixels,
}

/// Per-frame search state: current centres, discarded after the search.
struct WindowSearchState {
    left_x: i64,
    right_x: i64,
}

/// Run the windowed search over a binary bird's-eye mask (non-zero = lane).
pub fn search_lane_pixels(mask: &GrayImage, nwindows: usize, margin: u32, minpix: usize) -> SearchTrace {
    let (w, h) = mask.dimensions();
    let mut trace = SearchTrace::default();
    if w == 0 || h == 0 || nwindows == 0 {
        return trace;
    }

    // Positive columns per row, so each band only touches its own rows.
    let rows: Vec<Vec<u32>> = mask
        .rows()
        .map(|row| {
            row.enumerate()
                .filter(|(_, p)| p[0] > 0)
                .map(|(x, _)| x as u32)
                .collect()
        })
        .collect();

    let histogram = bottom_half_histogram(&rows, w as usize);
    let midpoint = histogram.len() / 2;
    let left_base = argmax(&histogram[..midpoint]);
    let right_base = argmax(&histogram[midpoint..]) + midpoint;
    trace.left_base = left_base as u32;
    trace.right_base = right_base as u32;

    let mut state = WindowSearchState {
        left_x: left_base as i64,
        right_x: right_base as i64,
    };

    let window_height = h / nwindows as u32;
    let margin = margin as i64;

    for window in 0..nwindows as u32 {
        let y_low = h.saturating_sub((window + 1) * window_height);
        let y_high = h.saturating_sub(window * window_height);

        let left = collect_window(&rows, y_low, y_high, state.left_x - margin, state.left_x + margin);
        let right = collect_window(&rows, y_low, y_high, state.right_x - margin, state.right_x + margin);

        trace.left_windows.push(SearchWindow {
            x_low: state.left_x - margin,
            x_high: state.left_x + margin,
            y_low,
            y_high,
            hits: left.len(),
        });
        trace.right_windows.push(SearchWindow {
            x_low: state.right_x - margin,
            x_high: state.right_x + margin,
            y_low,
            y_high,
            hits: right.len(),
        });

        if left.len() > minpix {
            state.left_x = mean_x(&left);
        }
        if right.len() > minpix {
            state.right_x = mean_x(&right);
        }

        trace.left.points.extend(left);
        trace.right.points.extend(right);
    }

    trace
}

/// Positive-pixel count per column over rows `h/2..h`.
fn bottom_half_histogram(rows: &[Vec<u32>], width: usize) -> Vec<u64> {
    let mut histogram = vec![0u64; width];
    for row in &rows[rows.len() / 2..] {
        for &x in row {
            histogram[x as usize] += 1;
        }
    }
    histogram
}

/// Index of the first maximum; 0 for an empty slice.
fn argmax(values: &[u64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn collect_window(rows: &[Vec<u32>], y_low: u32, y_high: u32, x_low: i64, x_high: i64) -> Vec<(u32, u32)> {
    let mut hits = Vec::new();
    for y in y_low..y_high {
        for &x in &rows[y as usize] {
            let xi = x as i64;
            if xi >= x_low && xi < x_high {
                hits.push((x, y));
            }
        }
    }
    hits
}

/// Truncated mean x of a non-empty pixel set.
fn mean_x(points: &[(u32, u32)]) -> i64 {
    let sum: u64 = points.iter().map(|&(x, _)| x as u64).sum();
    (sum / points.len() as u64) as i64
}
