// src/debug.rs
//
// Diagnostic renderings. None of these feed back into tracking.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::perspective::Quad;
use crate::tracking::{SearchTrace, SearchWindow};

const LEFT_PIXELS: Rgb<u8> = Rgb([255, 0, 0]);
const RIGHT_PIXELS: Rgb<u8> = Rgb([255, 255, 255]);
const WINDOW: Rgb<u8> = Rgb([255, 0, 255]);
const ROI_POINT: Rgb<u8> = Rgb([255, 0, 255]);
const GAUGE_TICK: Rgb<u8> = Rgb([255, 255, 0]);
const GAUGE_CENTRE: Rgb<u8> = Rgb([255, 0, 0]);

/// Bird's-eye mask with the search windows and the pixels each side claimed.
pub fn draw_search_trace(mask: &GrayImage, trace: &SearchTrace) -> RgbImage {
    let (w, h) = mask.dimensions();
    let mut out = RgbImage::from_fn(w, h, |x, y| {
        let v = mask.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    for &(x, y) in &trace.left.points {
        out.put_pixel(x, y, LEFT_PIXELS);
    }
    for &(x, y) in &trace.right.points {
        out.put_pixel(x, y, RIGHT_PIXELS);
    }
    for window in trace.left_windows.iter().chain(&trace.right_windows) {
        if let Some(rect) = window_rect(window) {
            draw_hollow_rect_mut(&mut out, rect, WINDOW);
        }
    }
    out
}

fn window_rect(window: &SearchWindow) -> Option<Rect> {
    let width = (window.x_high - window.x_low).max(0) as u32;
    let height = window.y_high.saturating_sub(window.y_low);
    if width == 0 || height == 0 {
        return None;
    }
    Some(Rect::at(window.x_low as i32, window.y_low as i32).of_size(width, height))
}

/// Frame copy with the ROI corners marked.
pub fn draw_roi_points(frame: &RgbImage, roi: &Quad) -> RgbImage {
    let mut out = frame.clone();
    for [x, y] in roi.scaled(frame.dimensions()) {
        draw_filled_circle_mut(&mut out, (x as i32, y as i32), 5, ROI_POINT);
    }
    out
}

/// Frame copy with a tick ruler along the bottom edge, shifted by `shift_px`,
/// and a fixed red marker at the frame centre.
pub fn draw_offset_gauge(frame: &RgbImage, shift_px: f64) -> RgbImage {
    let mut out = frame.clone();
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return out;
    }
    let (wf, hf) = (w as f32, h as f32);
    let shift = if shift_px.is_finite() { shift_px as f32 } else { 0.0 };
    let spacing = (w / 20) as f32;

    for i in -30..30 {
        let x = spacing * i as f32 + shift;
        thick_vertical(&mut out, x, hf - 30.0, hf, 2, GAUGE_TICK);
    }
    thick_vertical(&mut out, wf / 2.0 + shift, hf - 30.0, hf, 3, GAUGE_TICK);
    thick_vertical(&mut out, wf / 2.0, hf - 50.0, hf, 2, GAUGE_CENTRE);
    out
}

fn thick_vertical(image: &mut RgbImage, x: f32, y0: f32, y1: f32, thickness: u32, color: Rgb<u8>) {
    for dx in 0..thickness {
        let xi = x + dx as f32 - (thickness / 2) as f32;
        draw_line_segment_mut(image, (xi, y0), (xi, y1), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::search_lane_pixels;
    use image::Luma;

    #[test]
    fn test_search_trace_colours() {
        let mut mask = GrayImage::new(200, 100);
        for y in 0..100 {
            mask.put_pixel(40, y, Luma([255]));
            mask.put_pixel(160, y, Luma([255]));
        }
        let trace = search_lane_pixels(&mask, 10, 20, 1);
        let out = draw_search_trace(&mask, &trace);
        assert_eq!(out.dimensions(), (200, 100));
        assert_eq!(*out.get_pixel(40, 55), LEFT_PIXELS);
        assert_eq!(*out.get_pixel(160, 55), RIGHT_PIXELS);
        // Left edge of the bottom-left window.
        assert_eq!(*out.get_pixel(20, 95), WINDOW);
        assert_eq!(*out.get_pixel(100, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_roi_points_drawn_at_corners() {
        let frame = RgbImage::new(100, 100);
        let out = draw_roi_points(&frame, &Quad::DEFAULT_ROI);
        assert_eq!(*out.get_pixel(43, 65), ROI_POINT);
        assert_eq!(*out.get_pixel(10, 97), ROI_POINT);
        assert_eq!(*out.get_pixel(50, 20), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(43, 65), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_offset_gauge_marks_centre() {
        let frame = RgbImage::new(200, 100);
        let out = draw_offset_gauge(&frame, 0.0);
        assert_eq!(*out.get_pixel(100, 60), GAUGE_CENTRE);
        assert_eq!(*out.get_pixel(50, 20), Rgb([0, 0, 0]));
        assert!((70..100).any(|y| *out.get_pixel(30, y) == GAUGE_TICK));
    }

    #[test]
    fn test_offset_gauge_shift_moves_ticks() {
        let frame = RgbImage::new(200, 100);
        let still = draw_offset_gauge(&frame, 0.0);
        let shifted = draw_offset_gauge(&frame, 5.0);
        assert_eq!(*still.get_pixel(30, 90), GAUGE_TICK);
        assert_ne!(*shifted.get_pixel(30, 90), GAUGE_TICK);
        assert_eq!(*shifted.get_pixel(35, 90), GAUGE_TICK);
    }
}
