//! Per-tool gesture behavior.
//!
//! Every drawing tool follows the same lifecycle: `on_pointer_down` creates
//! the element (fixing its id), `on_pointer_move` mutates it in place, and
//! `on_pointer_up` hands it back for commit. Points are canvas-space; the
//! engine applies the viewport before calling in.
//!
//! Text has no drag phase. Its pointer-down only anchors the text; the
//! element is built by [`text_element`] once the host supplies the string.
//! Pan never produces elements and is handled by the engine directly.

#[cfg(test)]
#[path = "tools_test.rs"]
mod tools_test;

use frames::element::DEFAULT_FONT_SIZE;
use frames::{Element, Point, Shape};

use crate::consts::{ERASER_COLOR, ERASER_WIDTH_FACTOR};
use crate::input::{Tool, ToolStyle};

impl Tool {
    /// Start a gesture at `point`.
    ///
    /// Returns the new element for drag tools. Text and pan return `None`.
    #[must_use]
    pub fn on_pointer_down(self, point: Point, style: &ToolStyle) -> Option<Element> {
        let element = match self {
            Self::Pen => Element::new(Shape::Path { points: vec![point] }, style.color.clone(), style.stroke_width),
            Self::Eraser => Element::new(
                Shape::Eraser { points: vec![point] },
                ERASER_COLOR,
                style.stroke_width * ERASER_WIDTH_FACTOR,
            ),
            Self::Rect => Element::new(
                Shape::Rect { origin: point, width: 0.0, height: 0.0, fill_color: style.fill_color() },
                style.color.clone(),
                style.stroke_width,
            ),
            Self::Circle => Element::new(
                Shape::Circle { origin: point, width: 0.0, height: 0.0, fill_color: style.fill_color() },
                style.color.clone(),
                style.stroke_width,
            ),
            Self::Text | Self::Pan => return None,
        };
        Some(element)
    }

    /// Advance the gesture to `point`.
    ///
    /// Strokes append one point. Shapes recompute their extent from the
    /// fixed origin. Returns `false` when the element does not belong to this
    /// tool, leaving it untouched.
    pub fn on_pointer_move(self, point: Point, element: &mut Element) -> bool {
        if self.element_kind() != Some(element.kind()) || !self.is_drag_tool() {
            return false;
        }
        match element.origin() {
            Some(origin) => element.set_extent(point.x - origin.x, point.y - origin.y),
            None => element.push_point(point),
        }
    }

    /// End the gesture, returning the element to commit.
    ///
    /// The release position is not recorded; the element is final as of the
    /// last move.
    #[must_use]
    pub fn on_pointer_up(self, element: Element) -> Option<Element> {
        (self.is_drag_tool() && self.element_kind() == Some(element.kind())).then_some(element)
    }
}

/// Build a text element anchored at `origin`.
///
/// Returns `None` for empty text: nothing is created and nothing is sent.
#[must_use]
pub fn text_element(origin: Point, text: &str, style: &ToolStyle) -> Option<Element> {
    if text.is_empty() {
        return None;
    }
    Some(Element::new(
        Shape::Text { origin, text: text.to_owned(), font_size: DEFAULT_FONT_SIZE },
        style.color.clone(),
        style.stroke_width,
    ))
}
