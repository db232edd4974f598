//! JavaScript entry point.
//!
//! [`WebEngine`] is the type the browser host constructs. Pointer handlers
//! take CSS-pixel coordinates; every handler that produces actions returns
//! them as a JSON array string, e.g.
//! `[{"type":"element_committed","data":{...}},{"type":"render_needed"}]`.
//! The host sends `element_committed` data and `clear_requested` to the room
//! and calls `render` on `render_needed`.

use frames::Element;
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::engine::{Action, Engine, actions_to_json};
use crate::input::Tool;
use crate::viewport::Point;

#[wasm_bindgen]
pub struct WebEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl WebEngine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { engine: Engine::new(canvas) }
    }

    // --- Room data ---

    /// Replace the document with the body of `GET /rooms/{id}/elements`.
    ///
    /// # Errors
    ///
    /// Rejects a body that is not an element list.
    pub fn load_snapshot_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.engine.load_snapshot_json(json).map_err(js_error)
    }

    /// Apply a relayed element. Returns `false` for a duplicate id.
    ///
    /// # Errors
    ///
    /// Rejects JSON that is not an element.
    pub fn apply_remote_element_json(&mut self, json: &str) -> Result<bool, JsValue> {
        let element: Element = serde_json::from_str(json).map_err(js_error)?;
        Ok(self.engine.apply_remote_element(element))
    }

    pub fn apply_clear(&mut self) {
        self.engine.apply_clear();
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn request_clear(&self) -> Result<String, JsValue> {
        to_js(&self.engine.request_clear())
    }

    // --- Toolbar ---

    /// # Errors
    ///
    /// Rejects an unknown tool name.
    pub fn set_tool(&mut self, name: &str) -> Result<String, JsValue> {
        let tool = Tool::parse(name).ok_or_else(|| JsValue::from_str(&format!("unknown tool: {name}")))?;
        to_js(&self.engine.set_tool(tool))
    }

    pub fn set_color(&mut self, color: &str) {
        self.engine.set_color(color);
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.engine.set_stroke_width(width);
    }

    pub fn set_filled(&mut self, filled: bool) {
        self.engine.set_filled(filled);
    }

    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.engine.set_viewport(width_css, height_css, dpr);
    }

    // --- Pointer input ---

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn on_pointer_down(&mut self, x: f64, y: f64) -> Result<String, JsValue> {
        to_js(&self.engine.on_pointer_down(Point::new(x, y)))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn on_pointer_move(&mut self, x: f64, y: f64) -> Result<String, JsValue> {
        to_js(&self.engine.on_pointer_move(Point::new(x, y)))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn on_pointer_up(&mut self, x: f64, y: f64) -> Result<String, JsValue> {
        to_js(&self.engine.on_pointer_up(Point::new(x, y)))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn on_pointer_leave(&mut self, x: f64, y: f64) -> Result<String, JsValue> {
        to_js(&self.engine.on_pointer_leave(Point::new(x, y)))
    }

    // --- Text entry ---

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn commit_text(&mut self, text: &str) -> Result<String, JsValue> {
        to_js(&self.engine.commit_text(text))
    }

    /// # Errors
    ///
    /// Fails only if the actions cannot be serialized.
    pub fn cancel_text(&mut self) -> Result<String, JsValue> {
        to_js(&self.engine.cancel_text())
    }

    // --- Output ---

    /// # Errors
    ///
    /// Returns the canvas error if the 2D context is missing or a draw fails.
    pub fn render(&self) -> Result<(), JsValue> {
        self.engine.render()
    }

    #[must_use]
    pub fn cursor(&self) -> String {
        self.engine.cursor().to_owned()
    }
}

fn to_js(actions: &[Action]) -> Result<String, JsValue> {
    actions_to_json(actions).map_err(js_error)
}

fn js_error(err: serde_json::Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}
