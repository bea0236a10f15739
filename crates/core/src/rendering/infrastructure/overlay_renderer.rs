use std::sync::{Arc, Mutex};

use ndarray::ArrayViewMut3;

use crate::rendering::domain::frame_renderer::FrameRenderer;
use crate::rendering::domain::render_plan::{RenderPlan, Rgb, CONTOUR_COLOR};
use crate::shared::frame::Frame;

/// Most recent composed frame, shared with whoever displays it.
pub type LatestFrame = Arc<Mutex<Option<Frame>>>;

/// Software renderer that burns the plan into a copy of the captured frame.
///
/// The source frame is never modified, so every tick starts from clean pixels.
/// Markers are filled squares of `2 * radius + 1` pixels; contours are
/// one-pixel Bresenham lines.
pub struct OverlayRenderer {
    marker_radius: u32,
    latest: LatestFrame,
}

impl OverlayRenderer {
    pub fn new(marker_radius: u32) -> Self {
        Self {
            marker_radius,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn latest_handle(&self) -> LatestFrame {
        self.latest.clone()
    }

    /// Draws `plan` over a copy of `frame`.
    pub fn compose(&self, frame: &Frame, plan: &RenderPlan) -> Frame {
        let mut canvas = frame.clone();
        {
            let mut pixels = canvas.as_ndarray_mut();
            for contour in &plan.contours {
                for pair in contour.windows(2) {
                    draw_line(&mut pixels, pair[0], pair[1], CONTOUR_COLOR);
                }
            }
            // Markers go on top so the highlight stays visible over contours.
            for point in &plan.points {
                draw_marker(&mut pixels, (point.x, point.y), self.marker_radius, point.color);
            }
        }
        canvas
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FrameRenderer for OverlayRenderer {
    fn render(&mut self, frame: &Frame, plan: &RenderPlan) -> Result<(), Box<dyn std::error::Error>> {
        let composed = self.compose(frame, plan);
        let mut slot = self
            .latest
            .lock()
            .map_err(|_| "Overlay frame lock poisoned")?;
        *slot = Some(composed);
        Ok(())
    }
}

fn put_pixel(pixels: &mut ArrayViewMut3<'_, u8>, x: i64, y: i64, color: Rgb) {
    let (h, w, channels) = pixels.dim();
    if x < 0 || y < 0 || x as usize >= w || y as usize >= h || channels < 3 {
        return;
    }
    for (c, value) in color.iter().enumerate() {
        pixels[[y as usize, x as usize, c]] = *value;
    }
}

/// Filled square of side `2 * radius + 1`, clipped to the frame.
fn draw_marker(pixels: &mut ArrayViewMut3<'_, u8>, (x, y): (f64, f64), radius: u32, color: Rgb) {
    if !(x.is_finite() && y.is_finite()) {
        return;
    }
    let (h, w, _) = pixels.dim();
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let r = radius as i64;
    let (x_lo, x_hi) = (cx.saturating_sub(r).max(0), cx.saturating_add(r).min(w as i64 - 1));
    let (y_lo, y_hi) = (cy.saturating_sub(r).max(0), cy.saturating_add(r).min(h as i64 - 1));
    for py in y_lo..=y_hi {
        for px in x_lo..=x_hi {
            put_pixel(pixels, px, py, color);
        }
    }
}

/// Bresenham over the part of the segment inside the frame.
fn draw_line(pixels: &mut ArrayViewMut3<'_, u8>, from: (f64, f64), to: (f64, f64), color: Rgb) {
    let (h, w, _) = pixels.dim();
    let Some((from, to)) = clip_segment(from, to, w, h) else {
        return;
    };
    let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(pixels, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Liang-Barsky clip against `[0, w-1] x [0, h-1]`.
///
/// `None` when the segment misses the frame or has a non-finite endpoint.
fn clip_segment(
    from: (f64, f64),
    to: (f64, f64),
    w: usize,
    h: usize,
) -> Option<((f64, f64), (f64, f64))> {
    let finite = [from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite());
    if !finite || w == 0 || h == 0 {
        return None;
    }
    let (x0, y0) = from;
    let (dx, dy) = (to.0 - x0, to.1 - y0);
    let (x_max, y_max) = ((w - 1) as f64, (h - 1) as f64);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (p, q) in [(-dx, x0), (dx, x_max - x0), (-dy, y0), (dy, y_max - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some(((x0 + t0 * dx, y0 + t0 * dy), (x0 + t1 * dx, y0 + t1 * dy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::domain::render_plan::{PointMarker, HIGHLIGHT_COLOR, POINT_COLOR};
    use rstest::rstest;

    const BLACK: Rgb = [0, 0, 0];

    fn marker(x: f64, y: f64, color: Rgb) -> PointMarker {
        PointMarker { x, y, color }
    }

    #[test]
    fn test_marker_fills_square_around_point() {
        let renderer = OverlayRenderer::new(1);
        let frame = Frame::filled(10, 10, BLACK, 0);
        let plan = RenderPlan {
            points: vec![marker(5.0, 5.0, POINT_COLOR)],
            contours: Vec::new(),
        };

        let out = renderer.compose(&frame, &plan);

        for (x, y) in [(4, 4), (5, 5), (6, 6), (4, 6)] {
            assert_eq!(out.pixel(x, y), Some(POINT_COLOR));
        }
        assert_eq!(out.pixel(3, 5), Some(BLACK));
        assert_eq!(out.pixel(7, 5), Some(BLACK));
    }

    #[test]
    fn test_source_frame_is_untouched() {
        let renderer = OverlayRenderer::new(0);
        let frame = Frame::filled(4, 4, BLACK, 0);
        let plan = RenderPlan {
            points: vec![marker(1.0, 1.0, HIGHLIGHT_COLOR)],
            contours: Vec::new(),
        };

        renderer.compose(&frame, &plan);

        assert_eq!(frame.pixel(1, 1), Some(BLACK));
    }

    #[test]
    fn test_contour_draws_connected_line() {
        let renderer = OverlayRenderer::new(0);
        let frame = Frame::filled(10, 10, BLACK, 0);
        let plan = RenderPlan {
            points: Vec::new(),
            contours: vec![vec![(0.0, 0.0), (9.0, 0.0), (9.0, 9.0)]],
        };

        let out = renderer.compose(&frame, &plan);

        for x in 0..10 {
            assert_eq!(out.pixel(x, 0), Some(CONTOUR_COLOR));
        }
        for y in 0..10 {
            assert_eq!(out.pixel(9, y), Some(CONTOUR_COLOR));
        }
        assert_eq!(out.pixel(0, 9), Some(BLACK));
    }

    #[test]
    fn test_off_frame_markers_are_clipped() {
        let renderer = OverlayRenderer::new(2);
        let frame = Frame::filled(5, 5, BLACK, 0);
        let plan = RenderPlan {
            points: vec![marker(-1.0, -1.0, POINT_COLOR), marker(100.0, 2.0, POINT_COLOR)],
            contours: vec![vec![(-20.0, 2.0), (30.0, 2.0)]],
        };

        let out = renderer.compose(&frame, &plan);

        assert_eq!(out.pixel(0, 0), Some(POINT_COLOR));
        assert_eq!(out.pixel(4, 2), Some(CONTOUR_COLOR));
    }

    #[test]
    fn test_render_replaces_previous_drawing() {
        let mut renderer = OverlayRenderer::new(0);
        let latest = renderer.latest_handle();
        let frame = Frame::filled(6, 6, BLACK, 0);

        let first = RenderPlan {
            points: vec![marker(1.0, 1.0, POINT_COLOR)],
            contours: Vec::new(),
        };
        renderer.render(&frame, &first).unwrap();
        renderer.render(&frame, &RenderPlan::empty()).unwrap();

        let shown = latest.lock().unwrap().clone().unwrap();
        assert_eq!(shown.pixel(1, 1), Some(BLACK));
    }

    #[test]
    fn test_non_finite_keypoints_are_skipped() {
        let renderer = OverlayRenderer::new(1);
        let frame = Frame::filled(8, 8, BLACK, 0);
        let plan = RenderPlan {
            points: vec![
                marker(f64::NAN, 3.0, POINT_COLOR),
                marker(f64::INFINITY, f64::NEG_INFINITY, POINT_COLOR),
                marker(2.0, 2.0, HIGHLIGHT_COLOR),
            ],
            contours: vec![
                vec![(f64::NEG_INFINITY, 0.0), (f64::INFINITY, 0.0)],
                vec![(0.0, 7.0), (f64::NAN, 7.0), (7.0, 7.0)],
            ],
        };

        let out = renderer.compose(&frame, &plan);

        assert_eq!(out.pixel(2, 2), Some(HIGHLIGHT_COLOR));
        assert_eq!(out.pixel(0, 0), Some(BLACK));
        assert_eq!(out.pixel(3, 7), Some(BLACK));
    }

    #[test]
    fn test_far_off_frame_segment_is_clipped_quickly() {
        let renderer = OverlayRenderer::new(0);
        let frame = Frame::filled(10, 10, BLACK, 0);
        let plan = RenderPlan {
            points: vec![marker(1e12, 1e12, POINT_COLOR)],
            contours: vec![
                vec![(0.0, 4.0), (2e8, 4.0)],
                vec![(-1e8, -1e8), (-1e8, 1e8)],
            ],
        };

        let start = std::time::Instant::now();
        let out = renderer.compose(&frame, &plan);

        assert!(start.elapsed() < std::time::Duration::from_millis(100));
        for x in 0..10 {
            assert_eq!(out.pixel(x, 4), Some(CONTOUR_COLOR));
        }
        assert_eq!(out.pixel(9, 9), Some(BLACK));
    }

    #[test]
    fn test_huge_marker_radius_fills_frame() {
        let renderer = OverlayRenderer::new(u32::MAX);
        let frame = Frame::filled(4, 4, BLACK, 0);
        let plan = RenderPlan {
            points: vec![marker(1.0, 1.0, POINT_COLOR)],
            contours: Vec::new(),
        };

        let out = renderer.compose(&frame, &plan);

        assert_eq!(out.pixel(3, 3), Some(POINT_COLOR));
    }

    #[rstest]
    #[case::inside((1.0, 1.0), (3.0, 2.0), Some(((1.0, 1.0), (3.0, 2.0))))]
    #[case::crosses_left((-4.0, 2.0), (4.0, 2.0), Some(((0.0, 2.0), (4.0, 2.0))))]
    #[case::crosses_right_edge((2.0, 0.0), (12.0, 0.0), Some(((2.0, 0.0), (4.0, 0.0))))]
    #[case::above((0.0, -3.0), (4.0, -1.0), None)]
    #[case::vertical_outside((7.0, 0.0), (7.0, 4.0), None)]
    fn test_clip_segment(
        #[case] from: (f64, f64),
        #[case] to: (f64, f64),
        #[case] expected: Option<((f64, f64), (f64, f64))>,
    ) {
        assert_eq!(clip_segment(from, to, 5, 5), expected);
    }
}
