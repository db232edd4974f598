#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

pub use frames::Point;

/// Per-client pan state. Never shared with other participants.
///
/// `offset` is in CSS pixels and is added to canvas coordinates when
/// rendering and subtracted from raw pointer coordinates before they reach
/// a tool, so tools always work in canvas space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub offset: Point,
}

impl Viewport {
    #[must_use]
    pub fn new(offset: Point) -> Self {
        Self { offset }
    }

    /// Convert a screen-space point (CSS pixels) to canvas coordinates.
    #[must_use]
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point {
            x: screen.x - self.offset.x,
            y: screen.y - self.offset.y,
        }
    }

    /// Convert a canvas-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point {
            x: canvas.x + self.offset.x,
            y: canvas.y + self.offset.y,
        }
    }

    /// Shift the view by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset.x += dx;
        self.offset.y += dy;
    }
}
