//! Canvas input and rendering engine for the collaborative whiteboard.
//!
//! This crate is compiled to WebAssembly and runs in the browser (it also
//! builds natively so the engine can be tested without a DOM). It owns the
//! client side of a room: the authoritative local element list, the pan
//! viewport, the per-tool gesture state machines, and drawing the scene. The
//! host JavaScript layer only wires DOM events to [`web::WebEngine`] and
//! forwards the resulting [`engine::Action`]s (as JSON) to the room session.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`doc`] | Ordered, id-deduplicated element store |
//! | [`viewport`] | Pan offset and screen/canvas coordinate conversions |
//! | [`input`] | Tool selection, style, and the gesture state machine |
//! | [`tools`] | Per-tool pointer-down/move/up behavior |
//! | [`render`] | Scene rendering through the [`render::Surface`] abstraction |
//! | [`consts`] | Palette, cursors, and tool factors |
//! | [`web`] | `wasm-bindgen` entry point for the browser host |

pub mod consts;
pub mod doc;
pub mod engine;
pub mod input;
pub mod render;
pub mod tools;
pub mod viewport;
pub mod web;
