use serde::{Deserialize, Serialize};

/// Releases smaller than this (CSS px, either axis) abort the drag.
pub const DRAG_ABORT_MIN: f64 = 4.0;

/// The vision provider rejects images below this size in device pixels.
pub const MIN_DEVICE_PIXELS: f64 = 50.0;

/// Gap kept between a floating panel and the viewport edge.
pub const PANEL_EDGE_PADDING: f64 = 4.0;

/// Horizontal gap between a selection and the panel placed beside it.
pub const PANEL_SELECTION_GAP: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Visible page area in CSS pixels.
pub type Viewport = Size;

/// Selection rectangle in CSS pixels. Always normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Build the rectangle spanned by a drag anchor and the current pointer.
    pub fn from_points(anchor: Point, current: Point) -> Self {
        Self {
            left: anchor.x.min(current.x),
            top: anchor.y.min(current.y),
            width: (current.x - anchor.x).abs(),
            height: (current.y - anchor.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn exceeds_drag_threshold(&self) -> bool {
        self.width >= DRAG_ABORT_MIN && self.height >= DRAG_ABORT_MIN
    }

    pub fn meets_device_minimum(&self, dpr: f64) -> bool {
        let dpr = effective_dpr(dpr);
        self.width * dpr >= MIN_DEVICE_PIXELS && self.height * dpr >= MIN_DEVICE_PIXELS
    }

    /// Scale into device pixels, rounding each edge independently.
    pub fn to_device(&self, dpr: f64) -> DeviceRect {
        let dpr = effective_dpr(dpr);
        DeviceRect {
            x: (self.left * dpr).round() as i64,
            y: (self.top * dpr).round() as i64,
            width: (self.width * dpr).round() as i64,
            height: (self.height * dpr).round() as i64,
        }
    }

    /// Default spot for a panel describing this selection: just right of it.
    pub fn panel_anchor(&self) -> Point {
        Point::new(self.right() + PANEL_SELECTION_GAP, self.top)
    }
}

/// Axis-aligned box in device pixels; may extend past the captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl DeviceRect {
    /// Intersect with a `width` x `height` frame. `None` when nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.clamp(0, width as i64);
        let y0 = self.y.clamp(0, height as i64);
        let x1 = self.x.saturating_add(self.width).clamp(0, width as i64);
        let y1 = self.y.saturating_add(self.height).clamp(0, height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Non-positive or non-finite ratios behave as 1.
pub fn effective_dpr(dpr: f64) -> f64 {
    if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 }
}

/// Keep a panel of `size` inside `viewport`, leaving the edge padding free.
/// When the panel is larger than the viewport it sticks to the top/left padding.
pub fn clamp_panel_position(position: Point, size: Size, viewport: Viewport) -> Point {
    let max_x = viewport.width - size.width - PANEL_EDGE_PADDING;
    let max_y = viewport.height - size.height - PANEL_EDGE_PADDING;
    Point::new(
        position.x.min(max_x).max(PANEL_EDGE_PADDING),
        position.y.min(max_y).max(PANEL_EDGE_PADDING),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_normalizes_any_drag_direction() {
        let rect = Rect::from_points(Point::new(120.0, 80.0), Point::new(20.0, 30.0));
        assert_eq!(rect, Rect::new(20.0, 30.0, 100.0, 50.0));
        assert_eq!(rect.right(), 120.0);
        assert_eq!(rect.bottom(), 80.0);
    }

    #[test]
    fn drag_threshold_requires_both_axes() {
        assert!(Rect::new(0.0, 0.0, 4.0, 4.0).exceeds_drag_threshold());
        assert!(!Rect::new(0.0, 0.0, 3.9, 100.0).exceeds_drag_threshold());
        assert!(!Rect::new(0.0, 0.0, 100.0, 3.0).exceeds_drag_threshold());
    }

    #[test]
    fn device_minimum_depends_on_ratio() {
        let rect = Rect::new(0.0, 0.0, 40.0, 60.0);
        assert!(!rect.meets_device_minimum(1.0));
        assert!(rect.meets_device_minimum(2.0));
        assert!(!rect.meets_device_minimum(0.0));
    }

    #[test]
    fn to_device_rounds_scaled_edges() {
        let device = Rect::new(10.0, 10.0, 100.0, 50.0).to_device(2.0);
        assert_eq!(
            device,
            DeviceRect {
                x: 20,
                y: 20,
                width: 200,
                height: 100
            }
        );
        let device = Rect::new(1.3, 0.2, 10.4, 10.0).to_device(1.5);
        assert_eq!((device.x, device.y, device.width, device.height), (2, 0, 16, 15));
    }

    #[test]
    fn clamp_to_trims_boxes_leaving_the_frame() {
        let device = DeviceRect {
            x: -10,
            y: 90,
            width: 50,
            height: 40,
        };
        assert_eq!(device.clamp_to(100, 100), Some((0, 90, 40, 10)));

        let outside = DeviceRect {
            x: 120,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(outside.clamp_to(100, 100), None);
    }

    #[test]
    fn clamp_to_saturates_oversized_boxes() {
        let device = Rect::new(10.0, 10.0, 1e300, f64::INFINITY).to_device(1.0);
        assert_eq!(device.width, i64::MAX);
        assert_eq!(device.clamp_to(400, 300), Some((10, 10, 390, 290)));
    }

    #[test]
    fn panel_position_stays_inside_viewport() {
        let viewport = Size::new(800.0, 600.0);
        let size = Size::new(300.0, 200.0);
        assert_eq!(
            clamp_panel_position(Point::new(700.0, -50.0), size, viewport),
            Point::new(496.0, 4.0)
        );
        assert_eq!(
            clamp_panel_position(Point::new(100.0, 100.0), size, viewport),
            Point::new(100.0, 100.0)
        );
        let huge = Size::new(1000.0, 1000.0);
        assert_eq!(
            clamp_panel_position(Point::new(50.0, 50.0), huge, viewport),
            Point::new(4.0, 4.0)
        );
    }
}
