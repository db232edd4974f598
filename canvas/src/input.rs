//! Input model: tools, drawing style, and the gesture state machine.
//!
//! `Tool` and `ToolStyle` capture the user's intent at the time of a pointer
//! event. `InputState` is the active gesture being tracked between
//! pointer-down and pointer-up (or pointer-leave), carrying everything needed
//! to mutate the in-progress element and commit it on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use frames::element::{DEFAULT_COLOR, DEFAULT_STROKE_WIDTH};
use frames::{Element, ElementKind, Point};
use serde::{Deserialize, Serialize};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Freehand stroke (default).
    #[default]
    Pen,
    /// Rectangle dragged from a corner.
    Rect,
    /// Circle dragged out from its center.
    Circle,
    /// Single line of text placed at a click.
    Text,
    /// Freehand stroke that removes pixels.
    Eraser,
    /// Drag the viewport. Produces no elements.
    Pan,
}

impl Tool {
    /// Parse a lowercase tool name as sent by the host toolbar.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pen" => Some(Self::Pen),
            "rect" => Some(Self::Rect),
            "circle" => Some(Self::Circle),
            "text" => Some(Self::Text),
            "eraser" => Some(Self::Eraser),
            "pan" => Some(Self::Pan),
            _ => None,
        }
    }

    /// Element kind this tool produces, or `None` for [`Tool::Pan`].
    #[must_use]
    pub fn element_kind(self) -> Option<ElementKind> {
        match self {
            Self::Pen => Some(ElementKind::Path),
            Self::Rect => Some(ElementKind::Rect),
            Self::Circle => Some(ElementKind::Circle),
            Self::Text => Some(ElementKind::Text),
            Self::Eraser => Some(ElementKind::Eraser),
            Self::Pan => None,
        }
    }

    /// Whether this tool has a drag phase that builds an element.
    #[must_use]
    pub fn is_drag_tool(self) -> bool {
        matches!(self, Self::Pen | Self::Rect | Self::Circle | Self::Eraser)
    }
}

/// Color, width, and fill mode applied to new elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStyle {
    pub color: String,
    pub stroke_width: f64,
    /// When set, rects and circles are filled with `color`.
    pub filled: bool,
}

impl Default for ToolStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_owned(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            filled: false,
        }
    }
}

impl ToolStyle {
    /// Fill color for new shapes, present only in fill mode.
    #[must_use]
    pub fn fill_color(&self) -> Option<String> {
        self.filled.then(|| self.color.clone())
    }
}

/// Persistent UI state visible to the host.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Currently active tool.
    pub tool: Tool,
    /// Style applied to the next element.
    pub style: ToolStyle,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// A drag tool is building an element. Its id is fixed for the whole gesture.
    Drawing {
        /// The in-progress element, in canvas space.
        element: Element,
    },
    /// The user is dragging the viewport.
    Panning {
        /// Screen-space position of the previous pointer event, used to compute the pan delta.
        last_screen: Point,
    },
    /// The text tool was clicked and the host is collecting the text.
    AwaitingText {
        /// Canvas-space anchor of the text.
        origin: Point,
        /// Style captured at click time.
        style: ToolStyle,
    },
}

impl InputState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The element being drawn, if any.
    #[must_use]
    pub fn current_element(&self) -> Option<&Element> {
        match self {
            Self::Drawing { element } => Some(element),
            _ => None,
        }
    }
}
