//! Element model: the atomic drawable unit of a room's canonical history.
//!
//! An [`Element`] carries the attributes shared by every kind (id, stroke
//! color, stroke width, author) plus a closed [`Shape`] variant holding the
//! kind-specific geometry. The JSON form is flat: the shape's fields sit next
//! to the common ones, discriminated by `"kind"`.
//!
//! Coordinates are always canvas-space; the viewport transform never leaks
//! into stored elements.

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an element. Assigned at creation, never changed.
pub type ElementId = Uuid;

/// Stroke color used when a record omits one.
pub const DEFAULT_COLOR: &str = "#000000";

/// Stroke width used when a record omits one.
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

/// Font size for text elements, in canvas units.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

/// A point in canvas space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Discriminant of an element, as stored in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Path,
    Rect,
    Circle,
    Text,
    Eraser,
}

impl ElementKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Text => "text",
            Self::Eraser => "eraser",
        }
    }

    /// Parse the lowercase kind name. Returns `None` for unknown kinds.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "path" => Some(Self::Path),
            "rect" => Some(Self::Rect),
            "circle" => Some(Self::Circle),
            "text" => Some(Self::Text),
            "eraser" => Some(Self::Eraser),
            _ => None,
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific geometry of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    /// Freehand polyline. Points are appended while the gesture is active.
    Path { points: Vec<Point> },
    /// Rectangle anchored at `origin`; `width`/`height` are signed drag deltas.
    Rect {
        origin: Point,
        width: f64,
        height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill_color: Option<String>,
    },
    /// Circle centered at `origin`; the radius is the length of `(width, height)`.
    Circle {
        origin: Point,
        width: f64,
        height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill_color: Option<String>,
    },
    /// Single line of text with its baseline starting at `origin`.
    Text {
        origin: Point,
        text: String,
        #[serde(default = "default_font_size")]
        font_size: f64,
    },
    /// Erasing stroke. Removes pixels under it at render time only.
    Eraser { points: Vec<Point> },
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

impl Shape {
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Path { .. } => ElementKind::Path,
            Self::Rect { .. } => ElementKind::Rect,
            Self::Circle { .. } => ElementKind::Circle,
            Self::Text { .. } => ElementKind::Text,
            Self::Eraser { .. } => ElementKind::Eraser,
        }
    }

    /// Circle radius: the Euclidean norm of the drag delta. `None` for other kinds.
    #[must_use]
    pub fn radius(&self) -> Option<f64> {
        match self {
            Self::Circle { width, height, .. } => Some(width.hypot(*height)),
            _ => None,
        }
    }
}

/// One drawable unit in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    /// Stroke color (CSS color string). Carried by erasers too, though unused.
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Display name of the contributing participant, for attribution only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(flatten)]
    pub shape: Shape,
}

/// Why an element was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElementError {
    #[error("stroke width must be positive, got {0}")]
    InvalidStrokeWidth(f64),
    #[error("{0} element needs at least one point")]
    EmptyPoints(ElementKind),
    #[error("text element has no text")]
    EmptyText,
    #[error("font size must be positive, got {0}")]
    InvalidFontSize(f64),
    #[error("{0} element has a non-finite coordinate")]
    NonFinite(ElementKind),
}

impl Element {
    /// Create an element with a fresh id.
    pub fn new(shape: Shape, color: impl Into<String>, stroke_width: f64) -> Self {
        Self { id: Uuid::new_v4(), color: color.into(), stroke_width, author: None, shape }
    }

    #[must_use]
    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.shape.kind()
    }

    /// Stroke points for paths and erasers; empty for everything else.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        match &self.shape {
            Shape::Path { points } | Shape::Eraser { points } => points,
            _ => &[],
        }
    }

    /// Anchor point for shapes and text.
    #[must_use]
    pub fn origin(&self) -> Option<Point> {
        match &self.shape {
            Shape::Rect { origin, .. } | Shape::Circle { origin, .. } | Shape::Text { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    #[must_use]
    pub fn fill_color(&self) -> Option<&str> {
        match &self.shape {
            Shape::Rect { fill_color, .. } | Shape::Circle { fill_color, .. } => fill_color.as_deref(),
            _ => None,
        }
    }

    /// Append a stroke point. Returns `false` if this kind has no points.
    pub fn push_point(&mut self, point: Point) -> bool {
        match &mut self.shape {
            Shape::Path { points } | Shape::Eraser { points } => {
                points.push(point);
                true
            }
            _ => false,
        }
    }

    /// Replace the signed extent of a rect or circle. Returns `false` for other kinds.
    pub fn set_extent(&mut self, new_width: f64, new_height: f64) -> bool {
        match &mut self.shape {
            Shape::Rect { width, height, .. } | Shape::Circle { width, height, .. } => {
                *width = new_width;
                *height = new_height;
                true
            }
            _ => false,
        }
    }

    /// Check the invariants every committed element must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ElementError> {
        if !(self.stroke_width.is_finite() && self.stroke_width > 0.0) {
            return Err(ElementError::InvalidStrokeWidth(self.stroke_width));
        }
        let kind = self.kind();
        match &self.shape {
            Shape::Path { points } | Shape::Eraser { points } => {
                if points.is_empty() {
                    return Err(ElementError::EmptyPoints(kind));
                }
                if !points.iter().all(|p| p.is_finite()) {
                    return Err(ElementError::NonFinite(kind));
                }
            }
            Shape::Rect { origin, width, height, .. } | Shape::Circle { origin, width, height, .. } => {
                if !(origin.is_finite() && width.is_finite() && height.is_finite()) {
                    return Err(ElementError::NonFinite(kind));
                }
            }
            Shape::Text { origin, text, font_size } => {
                if text.is_empty() {
                    return Err(ElementError::EmptyText);
                }
                if !(font_size.is_finite() && *font_size > 0.0) {
                    return Err(ElementError::InvalidFontSize(*font_size));
                }
                if !origin.is_finite() {
                    return Err(ElementError::NonFinite(kind));
                }
            }
        }
        Ok(())
    }
}
