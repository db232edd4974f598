//! Rendering: draws the full canvas scene to a 2D surface.
//!
//! Drawing goes through the [`Surface`] trait so the exact command stream can
//! be checked natively; [`web_sys::CanvasRenderingContext2d`] is the browser
//! implementation. The renderer reads elements and the viewport and produces
//! pixels. It never mutates application state.
//!
//! Fallible calls propagate `Surface::Error`; the top-level caller
//! ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::f64::consts::TAU;

use frames::{Element, Shape};
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use crate::consts::{COMPOSITE_ERASE, FONT_FAMILY, STROKE_ROUND};
use crate::doc::DocStore;
use crate::viewport::{Point, Viewport};

/// The subset of a 2D canvas context the renderer uses.
pub trait Surface {
    type Error;

    fn set_transform(&self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), Self::Error>;
    fn clear_rect(&self, x: f64, y: f64, w: f64, h: f64);
    fn translate(&self, x: f64, y: f64) -> Result<(), Self::Error>;
    fn save(&self);
    fn restore(&self);
    fn set_stroke_color(&self, color: &str);
    fn set_fill_color(&self, color: &str);
    fn set_line_width(&self, width: f64);
    fn set_line_cap(&self, cap: &str);
    fn set_line_join(&self, join: &str);
    fn set_composite(&self, op: &str) -> Result<(), Self::Error>;
    fn set_font(&self, font: &str);
    fn begin_path(&self);
    fn move_to(&self, x: f64, y: f64);
    fn line_to(&self, x: f64, y: f64);
    fn rect(&self, x: f64, y: f64, w: f64, h: f64);
    fn arc(&self, x: f64, y: f64, radius: f64, start: f64, end: f64) -> Result<(), Self::Error>;
    fn fill(&self);
    fn stroke(&self);
    fn fill_text(&self, text: &str, x: f64, y: f64) -> Result<(), Self::Error>;
}

/// Everything `draw_scene` needs besides the surface.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub doc: &'a DocStore,
    /// Element under construction, drawn after the committed ones.
    pub current: Option<&'a Element>,
    pub viewport: &'a Viewport,
    /// Viewport width in CSS pixels.
    pub width: f64,
    /// Viewport height in CSS pixels.
    pub height: f64,
    pub dpr: f64,
}

/// Draw the full scene: clear, apply the pan offset, then every element in
/// commit order followed by the in-progress element.
///
/// # Errors
///
/// Returns `Err` if any surface call fails (e.g. invalid context state).
pub fn draw_scene<S: Surface>(surface: &S, scene: &Scene<'_>) -> Result<(), S::Error> {
    // Layer 1: reset and clear the whole viewport, then pan.
    surface.set_transform(scene.dpr, 0.0, 0.0, scene.dpr, 0.0, 0.0)?;
    surface.clear_rect(0.0, 0.0, scene.width, scene.height);
    surface.translate(scene.viewport.offset.x, scene.viewport.offset.y)?;

    // Layer 2: committed elements, oldest first.
    for element in scene.doc {
        draw_element(surface, element)?;
    }

    // Layer 3: the gesture in progress.
    if let Some(element) = scene.current {
        draw_element(surface, element)?;
    }

    Ok(())
}

// =============================================================
// Element dispatch
// =============================================================

/// Draw one element in canvas coordinates.
///
/// # Errors
///
/// Returns `Err` if any surface call fails.
pub fn draw_element<S: Surface>(surface: &S, element: &Element) -> Result<(), S::Error> {
    match &element.shape {
        Shape::Path { points } => draw_stroke(surface, element, points, false),
        Shape::Eraser { points } => draw_stroke(surface, element, points, true),
        Shape::Rect { origin, width, height, fill_color } => with_saved(surface, || {
            surface.begin_path();
            surface.rect(origin.x, origin.y, *width, *height);
            finish_shape(surface, element, fill_color.as_deref());
            Ok(())
        }),
        Shape::Circle { origin, fill_color, .. } => {
            let radius = element.shape.radius().unwrap_or_default();
            with_saved(surface, || {
                surface.begin_path();
                surface.arc(origin.x, origin.y, radius, 0.0, TAU)?;
                finish_shape(surface, element, fill_color.as_deref());
                Ok(())
            })
        }
        Shape::Text { origin, text, font_size } => {
            if text.is_empty() {
                return Ok(());
            }
            with_saved(surface, || {
                surface.set_font(&format!("{font_size}px {FONT_FAMILY}"));
                surface.set_fill_color(&element.color);
                surface.fill_text(text, origin.x, origin.y)
            })
        }
    }
}

// =============================================================
// Renderers
// =============================================================

/// Polyline with round caps and joins. A single point draws nothing.
fn draw_stroke<S: Surface>(surface: &S, element: &Element, points: &[Point], erase: bool) -> Result<(), S::Error> {
    let [first, rest @ ..] = points else {
        return Ok(());
    };
    if rest.is_empty() {
        return Ok(());
    }

    with_saved(surface, || {
        if erase {
            surface.set_composite(COMPOSITE_ERASE)?;
        } else {
            surface.set_stroke_color(&element.color);
        }
        surface.set_line_width(element.stroke_width);
        surface.set_line_cap(STROKE_ROUND);
        surface.set_line_join(STROKE_ROUND);
        surface.begin_path();
        surface.move_to(first.x, first.y);
        for p in rest {
            surface.line_to(p.x, p.y);
        }
        surface.stroke();
        Ok(())
    })
}

/// Fill (when set) then stroke the current path.
fn finish_shape<S: Surface>(surface: &S, element: &Element, fill_color: Option<&str>) {
    if let Some(fill) = fill_color {
        surface.set_fill_color(fill);
        surface.fill();
    }
    surface.set_stroke_color(&element.color);
    surface.set_line_width(element.stroke_width);
    surface.stroke();
}

/// Run `draw` between `save` and `restore`. The state is restored even
/// when `draw` fails.
fn with_saved<S: Surface>(surface: &S, draw: impl FnOnce() -> Result<(), S::Error>) -> Result<(), S::Error> {
    surface.save();
    let result = draw();
    surface.restore();
    result
}

// =============================================================
// Browser surface
// =============================================================

impl Surface for CanvasRenderingContext2d {
    type Error = JsValue;

    fn set_transform(&self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::set_transform(self, a, b, c, d, e, f)
    }

    fn clear_rect(&self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::clear_rect(self, x, y, w, h);
    }

    fn translate(&self, x: f64, y: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::translate(self, x, y)
    }

    fn save(&self) {
        CanvasRenderingContext2d::save(self);
    }

    fn restore(&self) {
        CanvasRenderingContext2d::restore(self);
    }

    fn set_stroke_color(&self, color: &str) {
        self.set_stroke_style_str(color);
    }

    fn set_fill_color(&self, color: &str) {
        self.set_fill_style_str(color);
    }

    fn set_line_width(&self, width: f64) {
        CanvasRenderingContext2d::set_line_width(self, width);
    }

    fn set_line_cap(&self, cap: &str) {
        CanvasRenderingContext2d::set_line_cap(self, cap);
    }

    fn set_line_join(&self, join: &str) {
        CanvasRenderingContext2d::set_line_join(self, join);
    }

    fn set_composite(&self, op: &str) -> Result<(), JsValue> {
        self.set_global_composite_operation(op)
    }

    fn set_font(&self, font: &str) {
        CanvasRenderingContext2d::set_font(self, font);
    }

    fn begin_path(&self) {
        CanvasRenderingContext2d::begin_path(self);
    }

    fn move_to(&self, x: f64, y: f64) {
        CanvasRenderingContext2d::move_to(self, x, y);
    }

    fn line_to(&self, x: f64, y: f64) {
        CanvasRenderingContext2d::line_to(self, x, y);
    }

    fn rect(&self, x: f64, y: f64, w: f64, h: f64) {
        CanvasRenderingContext2d::rect(self, x, y, w, h);
    }

    fn arc(&self, x: f64, y: f64, radius: f64, start: f64, end: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::arc(self, x, y, radius, start, end)
    }

    fn fill(&self) {
        CanvasRenderingContext2d::fill(self);
    }

    fn stroke(&self) {
        CanvasRenderingContext2d::stroke(self);
    }

    fn fill_text(&self, text: &str, x: f64, y: f64) -> Result<(), JsValue> {
        CanvasRenderingContext2d::fill_text(self, text, x, y)
    }
}
