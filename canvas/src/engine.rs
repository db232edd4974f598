use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use frames::{Element, ElementId};

use crate::consts::{CURSOR_DRAW, CURSOR_GRAB, CURSOR_GRABBING};
use crate::doc::DocStore;
use crate::input::{InputState, Tool, ToolStyle, UiState};
use crate::render::{self, Scene};
use crate::tools::text_element;
use crate::viewport::{Point, Viewport};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Action {
    /// A gesture finished. Already in the local doc; send it to the room.
    ElementCommitted(Element),
    /// The text tool was clicked; collect text and call `commit_text` or `cancel_text`.
    TextInputRequested { origin: Point },
    /// Ask the room to clear. Local state clears when the notification arrives.
    ClearRequested,
    SetCursor(String),
    RenderNeeded,
}

/// Serialize handler actions into the JSON array handed to the JavaScript host.
///
/// # Errors
///
/// Returns the serializer error.
pub fn actions_to_json(actions: &[Action]) -> Result<String, serde_json::Error> {
    serde_json::to_string(actions)
}

/// Core engine state: all logic that doesn't depend on the canvas element.
///
/// Separated from `Engine` so it can be tested without WASM/browser dependencies.
pub struct EngineCore {
    pub doc: DocStore,
    pub viewport: Viewport,
    pub ui: UiState,
    pub input: InputState,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            doc: DocStore::new(),
            viewport: Viewport::default(),
            ui: UiState::default(),
            input: InputState::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Data inputs ---

    /// Hydrate the document from a replayed room log.
    pub fn load_snapshot(&mut self, elements: Vec<Element>) {
        self.doc.load_snapshot(elements);
    }

    /// Hydrate the document from the JSON body of the elements endpoint.
    ///
    /// # Errors
    ///
    /// Returns the parse error; the document is left unchanged.
    pub fn load_snapshot_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let elements: Vec<Element> = serde_json::from_str(json)?;
        self.load_snapshot(elements);
        Ok(())
    }

    /// Apply an element relayed from another member. Returns `false` for a
    /// duplicate id.
    pub fn apply_remote_element(&mut self, element: Element) -> bool {
        self.doc.commit(element)
    }

    /// Apply the room's clear notification.
    ///
    /// A gesture in progress is kept; it was never part of the cleared log.
    pub fn apply_clear(&mut self) {
        self.doc.clear();
    }

    /// Ask the room to clear every element.
    #[must_use]
    pub fn request_clear(&self) -> Vec<Action> {
        vec![Action::ClearRequested]
    }

    // --- Tool / style ---

    /// Switch tools. A gesture in progress is dropped without committing.
    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        let cancelled = !self.input.is_idle();
        self.input = InputState::Idle;
        self.ui.tool = tool;
        let mut actions = vec![Action::SetCursor(self.cursor().to_owned())];
        if cancelled {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.ui.style.color = color.into();
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.ui.style.stroke_width = width;
        }
    }

    pub fn set_filled(&mut self, filled: bool) {
        self.ui.style.filled = filled;
    }

    /// Update viewport dimensions and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.viewport_width = width_css;
        self.viewport_height = height_css;
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point) -> Vec<Action> {
        if matches!(self.input, InputState::AwaitingText { .. }) {
            return Vec::new();
        }
        // A missed release must not leave a stale gesture behind.
        let mut actions = self.on_pointer_up(screen_pt);

        let tool = self.ui.tool;
        let canvas_pt = self.viewport.screen_to_canvas(screen_pt);
        match tool {
            Tool::Pan => {
                self.input = InputState::Panning { last_screen: screen_pt };
                actions.push(Action::SetCursor(CURSOR_GRABBING.to_owned()));
            }
            Tool::Text => {
                self.input = InputState::AwaitingText { origin: canvas_pt, style: self.ui.style.clone() };
                actions.push(Action::TextInputRequested { origin: canvas_pt });
            }
            Tool::Pen | Tool::Rect | Tool::Circle | Tool::Eraser => {
                if let Some(element) = tool.on_pointer_down(canvas_pt, &self.ui.style) {
                    self.input = InputState::Drawing { element };
                    actions.push(Action::RenderNeeded);
                }
            }
        }
        actions
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let tool = self.ui.tool;
        let canvas_pt = self.viewport.screen_to_canvas(screen_pt);
        match &mut self.input {
            InputState::Panning { last_screen } => {
                let (dx, dy) = (screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                *last_screen = screen_pt;
                self.viewport.pan_by(dx, dy);
                vec![Action::RenderNeeded]
            }
            InputState::Drawing { element } => {
                if tool.on_pointer_move(canvas_pt, element) {
                    vec![Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
            InputState::Idle | InputState::AwaitingText { .. } => Vec::new(),
        }
    }

    /// Finish the active gesture. Drag tools commit their element.
    pub fn on_pointer_up(&mut self, _screen_pt: Point) -> Vec<Action> {
        match std::mem::take(&mut self.input) {
            InputState::Panning { .. } => vec![Action::SetCursor(CURSOR_GRAB.to_owned())],
            InputState::Drawing { element } => match self.ui.tool.on_pointer_up(element) {
                Some(element) => self.commit_local(element),
                None => vec![Action::RenderNeeded],
            },
            InputState::Idle => Vec::new(),
            state @ InputState::AwaitingText { .. } => {
                self.input = state;
                Vec::new()
            }
        }
    }

    /// The pointer left the canvas; same as releasing it.
    pub fn on_pointer_leave(&mut self, screen_pt: Point) -> Vec<Action> {
        self.on_pointer_up(screen_pt)
    }

    // --- Text ---

    /// Complete a pending text placement. Empty text creates nothing.
    pub fn commit_text(&mut self, text: &str) -> Vec<Action> {
        let InputState::AwaitingText { origin, style } = std::mem::take(&mut self.input) else {
            return Vec::new();
        };
        match text_element(origin, text, &style) {
            Some(element) => self.commit_local(element),
            None => Vec::new(),
        }
    }

    /// Abandon a pending text placement.
    pub fn cancel_text(&mut self) -> Vec<Action> {
        if matches!(self.input, InputState::AwaitingText { .. }) {
            self.input = InputState::Idle;
        }
        Vec::new()
    }

    fn commit_local(&mut self, element: Element) -> Vec<Action> {
        if !self.doc.commit(element.clone()) {
            return vec![Action::RenderNeeded];
        }
        vec![Action::ElementCommitted(element), Action::RenderNeeded]
    }

    // --- Queries ---

    /// Cursor for the current tool and gesture.
    #[must_use]
    pub fn cursor(&self) -> &'static str {
        match (self.ui.tool, &self.input) {
            (Tool::Pan, InputState::Panning { .. }) => CURSOR_GRABBING,
            (Tool::Pan, _) => CURSOR_GRAB,
            _ => CURSOR_DRAW,
        }
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.ui.tool
    }

    #[must_use]
    pub fn style(&self) -> &ToolStyle {
        &self.ui.style
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        self.doc.elements()
    }

    /// The element being drawn, if a drag gesture is active.
    #[must_use]
    pub fn current_element(&self) -> Option<&Element> {
        self.input.current_element()
    }

    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.doc.get(id)
    }

    /// Borrow everything the renderer needs.
    #[must_use]
    pub fn scene(&self) -> Scene<'_> {
        Scene {
            doc: &self.doc,
            current: self.current_element(),
            viewport: &self.viewport,
            width: self.viewport_width,
            height: self.viewport_height,
            dpr: self.dpr,
        }
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    pub core: EngineCore,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas, core: EngineCore::new() }
    }

    // --- Delegated data inputs ---

    pub fn load_snapshot(&mut self, elements: Vec<Element>) {
        self.core.load_snapshot(elements);
    }

    /// # Errors
    ///
    /// Returns the parse error; the document is left unchanged.
    pub fn load_snapshot_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        self.core.load_snapshot_json(json)
    }

    pub fn apply_remote_element(&mut self, element: Element) -> bool {
        self.core.apply_remote_element(element)
    }

    pub fn apply_clear(&mut self) {
        self.core.apply_clear();
    }

    #[must_use]
    pub fn request_clear(&self) -> Vec<Action> {
        self.core.request_clear()
    }

    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        self.core.set_tool(tool)
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.core.set_color(color);
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.core.set_stroke_width(width);
    }

    pub fn set_filled(&mut self, filled: bool) {
        self.core.set_filled(filled);
    }

    pub fn commit_text(&mut self, text: &str) -> Vec<Action> {
        self.core.commit_text(text)
    }

    pub fn cancel_text(&mut self) -> Vec<Action> {
        self.core.cancel_text()
    }

    // --- Viewport ---

    /// Update viewport dimensions and resize the backing store to match.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.core.set_viewport(width_css, height_css, dpr);
        let dpr = self.core.dpr;
        self.canvas.set_width((width_css * dpr).round().max(0.0) as u32);
        self.canvas.set_height((height_css * dpr).round().max(0.0) as u32);
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.on_pointer_down(screen_pt)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.on_pointer_move(screen_pt)
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.on_pointer_up(screen_pt)
    }

    pub fn on_pointer_leave(&mut self, screen_pt: Point) -> Vec<Action> {
        self.core.on_pointer_leave(screen_pt)
    }

    // --- Render ---

    /// Draw the current state to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the 2D context is unavailable or a draw call fails.
    pub fn render(&self) -> Result<(), JsValue> {
        let ctx = self
            .canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        render::draw_scene(&ctx, &self.core.scene())
    }

    // --- Delegated queries ---

    #[must_use]
    pub fn cursor(&self) -> &'static str {
        self.core.cursor()
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.core.viewport()
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        self.core.elements()
    }
}
