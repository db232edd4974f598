//! Shared constants for the canvas crate.

// ── Palette ─────────────────────────────────────────────────────

/// Toolbar swatches, in display order.
pub const PALETTE: [&str; 5] = ["#000000", "#FF0000", "#0000FF", "#008000", "#FFA500"];

// ── Eraser ──────────────────────────────────────────────────────

/// Multiplier applied to the selected stroke width for erasing strokes.
pub const ERASER_WIDTH_FACTOR: f64 = 5.0;

/// Color stamped on eraser elements. Never painted.
pub const ERASER_COLOR: &str = "#000000";

/// Composite mode that removes the pixels under a stroke.
pub const COMPOSITE_ERASE: &str = "destination-out";

// ── Strokes and text ────────────────────────────────────────────

/// Line cap and join used for freehand and eraser strokes.
pub const STROKE_ROUND: &str = "round";

/// Font family for text elements; the size comes from the element.
pub const FONT_FAMILY: &str = "sans-serif";

// ── Cursors ─────────────────────────────────────────────────────

/// Cursor for every element-producing tool.
pub const CURSOR_DRAW: &str = "crosshair";

/// Pan tool cursor while idle.
pub const CURSOR_GRAB: &str = "grab";

/// Pan tool cursor while dragging.
pub const CURSOR_GRABBING: &str = "grabbing";
