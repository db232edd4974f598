#![allow(clippy::float_cmp)]

use frames::{ElementKind, Shape};

use super::*;

// =============================================================
// Helpers
// =============================================================

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn engine_with(tool: Tool) -> EngineCore {
    let mut core = EngineCore::new();
    core.set_tool(tool);
    core
}

fn committed(actions: &[Action]) -> Vec<&Element> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::ElementCommitted(el) => Some(el),
            _ => None,
        })
        .collect()
}

/// Run a full down → moves → up gesture and return every action emitted.
fn gesture(core: &mut EngineCore, down: Point, moves: &[Point], up: Point) -> Vec<Action> {
    let mut actions = core.on_pointer_down(down);
    for &m in moves {
        actions.extend(core.on_pointer_move(m));
    }
    actions.extend(core.on_pointer_up(up));
    actions
}

fn stroke(x: f64) -> Element {
    Element::new(Shape::Path { points: vec![pt(x, 0.0), pt(x, 1.0)] }, "#000000", 3.0)
}

// =============================================================
// Defaults
// =============================================================

#[test]
fn new_engine_defaults() {
    let core = EngineCore::new();
    assert_eq!(core.tool(), Tool::Pen);
    assert!(core.elements().is_empty());
    assert_eq!(core.viewport(), Viewport::default());
    assert_eq!(core.cursor(), "crosshair");
    assert_eq!(core.dpr, 1.0);
}

// =============================================================
// Completed gestures
// =============================================================

#[test]
fn every_drag_tool_commits_exactly_one_element_with_stable_id() {
    for tool in [Tool::Pen, Tool::Rect, Tool::Circle, Tool::Eraser] {
        let mut core = engine_with(tool);
        core.on_pointer_down(pt(0.0, 0.0));
        let id = core.current_element().map(|el| el.id).expect("in progress");

        for i in 1..5 {
            core.on_pointer_move(pt(f64::from(i), f64::from(i)));
            assert_eq!(core.current_element().map(|el| el.id), Some(id), "{tool:?}");
        }

        let actions = core.on_pointer_up(pt(4.0, 4.0));
        let done = committed(&actions);
        assert_eq!(done.len(), 1, "{tool:?}");
        assert_eq!(done[0].id, id);
        assert_eq!(core.elements().len(), 1);
        assert!(core.current_element().is_none());
    }
}

#[test]
fn pen_points_are_moves_plus_one_in_order() {
    let mut core = engine_with(Tool::Pen);
    let moves = [pt(1.0, 1.0), pt(2.0, 4.0), pt(3.0, 9.0)];
    let actions = gesture(&mut core, pt(0.0, 0.0), &moves, pt(3.0, 9.0));
    let el = committed(&actions)[0];
    assert_eq!(el.kind(), ElementKind::Path);
    assert_eq!(el.points(), &[pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 4.0), pt(3.0, 9.0)]);
}

#[test]
fn eraser_points_are_moves_plus_one() {
    let mut core = engine_with(Tool::Eraser);
    let actions = gesture(&mut core, pt(0.0, 0.0), &[pt(1.0, 0.0), pt(2.0, 0.0)], pt(2.0, 0.0));
    let el = committed(&actions)[0];
    assert_eq!(el.kind(), ElementKind::Eraser);
    assert_eq!(el.points().len(), 3);
    assert_eq!(el.stroke_width, 15.0);
}

#[test]
fn rect_gesture_yields_expected_extent() {
    let mut core = engine_with(Tool::Rect);
    let actions = gesture(&mut core, pt(10.0, 10.0), &[pt(50.0, 10.0), pt(50.0, 40.0)], pt(50.0, 40.0));
    let el = committed(&actions)[0];
    assert_eq!(el.shape, Shape::Rect { origin: pt(10.0, 10.0), width: 40.0, height: 30.0, fill_color: None });
}

#[test]
fn circle_gesture_yields_radius_fifty() {
    let mut core = engine_with(Tool::Circle);
    let actions = gesture(&mut core, pt(10.0, 10.0), &[pt(50.0, 10.0), pt(50.0, 40.0)], pt(50.0, 40.0));
    assert_eq!(committed(&actions)[0].shape.radius(), Some(50.0));
}

#[test]
fn fill_mode_and_color_flow_into_shapes() {
    let mut core = engine_with(Tool::Rect);
    core.set_color("#FF0000");
    core.set_filled(true);
    let actions = gesture(&mut core, pt(0.0, 0.0), &[pt(5.0, 5.0)], pt(5.0, 5.0));
    let el = committed(&actions)[0];
    assert_eq!(el.color, "#FF0000");
    assert_eq!(el.fill_color(), Some("#FF0000"));
}

#[test]
fn click_without_move_commits_single_point_path() {
    let mut core = engine_with(Tool::Pen);
    let actions = gesture(&mut core, pt(3.0, 3.0), &[], pt(3.0, 3.0));
    assert_eq!(committed(&actions)[0].points().len(), 1);
}

// =============================================================
// Idle / edge cases
// =============================================================

#[test]
fn move_while_idle_is_ignored() {
    let mut core = engine_with(Tool::Pen);
    assert!(core.on_pointer_move(pt(5.0, 5.0)).is_empty());
    assert!(core.on_pointer_up(pt(5.0, 5.0)).is_empty());
    assert!(core.elements().is_empty());
}

#[test]
fn pointer_leave_commits_like_pointer_up() {
    let mut core = engine_with(Tool::Pen);
    core.on_pointer_down(pt(0.0, 0.0));
    core.on_pointer_move(pt(1.0, 1.0));
    let actions = core.on_pointer_leave(pt(900.0, 900.0));
    assert_eq!(committed(&actions).len(), 1);
    assert_eq!(core.elements()[0].points().len(), 2);
}

#[test]
fn switching_tools_mid_gesture_cancels_without_commit() {
    let mut core = engine_with(Tool::Pen);
    core.on_pointer_down(pt(0.0, 0.0));
    core.on_pointer_move(pt(1.0, 1.0));
    let actions = core.set_tool(Tool::Rect);
    assert!(committed(&actions).is_empty());
    assert!(actions.contains(&Action::RenderNeeded));
    assert!(core.current_element().is_none());
    assert!(core.on_pointer_up(pt(1.0, 1.0)).is_empty());
    assert!(core.elements().is_empty());
}

#[test]
fn set_tool_reports_cursor() {
    let mut core = EngineCore::new();
    assert_eq!(core.set_tool(Tool::Pan), vec![Action::SetCursor("grab".into())]);
    assert_eq!(core.set_tool(Tool::Circle), vec![Action::SetCursor("crosshair".into())]);
}

#[test]
fn invalid_stroke_width_is_ignored() {
    let mut core = EngineCore::new();
    core.set_stroke_width(0.0);
    core.set_stroke_width(f64::NAN);
    assert_eq!(core.style().stroke_width, 3.0);
    core.set_stroke_width(8.0);
    assert_eq!(core.style().stroke_width, 8.0);
}

// =============================================================
// Text
// =============================================================

#[test]
fn text_click_requests_input_then_commits() {
    let mut core = engine_with(Tool::Text);
    let actions = core.on_pointer_down(pt(20.0, 30.0));
    assert_eq!(actions, vec![Action::TextInputRequested { origin: pt(20.0, 30.0) }]);
    assert!(core.on_pointer_move(pt(50.0, 50.0)).is_empty());
    assert!(core.on_pointer_up(pt(50.0, 50.0)).is_empty());

    let actions = core.commit_text("hello");
    let el = committed(&actions)[0];
    assert_eq!(el.shape, Shape::Text { origin: pt(20.0, 30.0), text: "hello".into(), font_size: 24.0 });
    assert_eq!(core.elements().len(), 1);
}

#[test]
fn empty_text_creates_nothing() {
    let mut core = engine_with(Tool::Text);
    core.on_pointer_down(pt(0.0, 0.0));
    assert!(core.commit_text("").is_empty());
    assert!(core.elements().is_empty());
    assert!(core.input.is_idle());
}

#[test]
fn cancelled_text_creates_nothing() {
    let mut core = engine_with(Tool::Text);
    core.on_pointer_down(pt(0.0, 0.0));
    assert!(core.cancel_text().is_empty());
    assert!(core.input.is_idle());
    assert!(core.commit_text("late").is_empty());
    assert!(core.elements().is_empty());
}

#[test]
fn clicks_while_awaiting_text_are_ignored() {
    let mut core = engine_with(Tool::Text);
    core.on_pointer_down(pt(1.0, 1.0));
    assert!(core.on_pointer_down(pt(9.0, 9.0)).is_empty());
    let actions = core.commit_text("x");
    assert_eq!(committed(&actions)[0].origin(), Some(pt(1.0, 1.0)));
}

#[test]
fn text_uses_style_captured_at_click() {
    let mut core = engine_with(Tool::Text);
    core.set_color("#008000");
    core.on_pointer_down(pt(0.0, 0.0));
    core.set_color("#FF0000");
    let actions = core.commit_text("t");
    assert_eq!(committed(&actions)[0].color, "#008000");
}

// =============================================================
// Pan
// =============================================================

#[test]
fn pan_moves_viewport_by_pointer_delta() {
    let mut core = engine_with(Tool::Pan);
    let down = core.on_pointer_down(pt(100.0, 100.0));
    assert_eq!(down, vec![Action::SetCursor("grabbing".into())]);
    assert_eq!(core.cursor(), "grabbing");

    core.on_pointer_move(pt(110.0, 105.0));
    core.on_pointer_move(pt(130.0, 95.0));
    assert_eq!(core.viewport().offset, pt(30.0, -5.0));

    let up = core.on_pointer_up(pt(130.0, 95.0));
    assert_eq!(up, vec![Action::SetCursor("grab".into())]);
    assert!(core.elements().is_empty());
}

#[test]
fn pan_and_reverse_restore_offset() {
    let mut core = engine_with(Tool::Pan);
    gesture(&mut core, pt(0.0, 0.0), &[pt(40.0, -25.0)], pt(40.0, -25.0));
    gesture(&mut core, pt(40.0, -25.0), &[pt(0.0, 0.0)], pt(0.0, 0.0));
    assert_eq!(core.viewport(), Viewport::default());
}

#[test]
fn tools_receive_canvas_space_points_after_pan() {
    let mut core = engine_with(Tool::Pan);
    gesture(&mut core, pt(0.0, 0.0), &[pt(100.0, 50.0)], pt(100.0, 50.0));

    core.set_tool(Tool::Pen);
    let actions = gesture(&mut core, pt(110.0, 60.0), &[pt(120.0, 70.0)], pt(120.0, 70.0));
    assert_eq!(committed(&actions)[0].points(), &[pt(10.0, 10.0), pt(20.0, 20.0)]);
}

// =============================================================
// Remote data
// =============================================================

#[test]
fn replay_then_relay_dedupes_same_element() {
    let mut core = EngineCore::new();
    let a = stroke(1.0);
    core.load_snapshot(vec![a.clone()]);
    assert!(!core.apply_remote_element(a.clone()));
    assert!(core.apply_remote_element(stroke(2.0)));
    assert_eq!(core.elements().len(), 2);
    assert_eq!(core.elements()[0].id, a.id);
}

#[test]
fn load_snapshot_json_parses_rest_body() {
    let mut core = EngineCore::new();
    let body = serde_json::to_string(&vec![stroke(1.0), stroke(2.0)]).expect("serialize");
    core.load_snapshot_json(&body).expect("parse");
    assert_eq!(core.elements().len(), 2);
}

#[test]
fn load_snapshot_json_error_leaves_doc_unchanged() {
    let mut core = EngineCore::new();
    core.load_snapshot(vec![stroke(1.0)]);
    assert!(core.load_snapshot_json("{not json").is_err());
    assert_eq!(core.elements().len(), 1);
}

#[test]
fn clear_notification_empties_doc_but_keeps_gesture() {
    let mut core = engine_with(Tool::Pen);
    core.load_snapshot(vec![stroke(1.0), stroke(2.0)]);
    core.on_pointer_down(pt(0.0, 0.0));
    core.apply_clear();
    assert!(core.elements().is_empty());
    assert!(core.current_element().is_some());
}

#[test]
fn request_clear_emits_action_without_touching_doc() {
    let mut core = EngineCore::new();
    core.load_snapshot(vec![stroke(1.0)]);
    assert_eq!(core.request_clear(), vec![Action::ClearRequested]);
    assert_eq!(core.elements().len(), 1);
}

// =============================================================
// Scene
// =============================================================

#[test]
fn scene_exposes_current_element_and_viewport() {
    let mut core = engine_with(Tool::Pen);
    core.set_viewport(800.0, 600.0, 2.0);
    core.on_pointer_down(pt(5.0, 5.0));
    let scene = core.scene();
    assert!(scene.current.is_some());
    assert_eq!(scene.width, 800.0);
    assert_eq!(scene.dpr, 2.0);
}

#[test]
fn invalid_dpr_falls_back_to_one() {
    let mut core = EngineCore::new();
    core.set_viewport(10.0, 10.0, 0.0);
    assert_eq!(core.dpr, 1.0);
}

#[test]
fn actions_serialize_with_type_tag() {
    let json = serde_json::to_value(Action::SetCursor("grab".into())).expect("serialize");
    assert_eq!(json, serde_json::json!({"type": "set_cursor", "data": "grab"}));
    let json = serde_json::to_value(Action::ClearRequested).expect("serialize");
    assert_eq!(json, serde_json::json!({"type": "clear_requested"}));
}

#[test]
fn committed_gesture_serializes_for_the_host() {
    let mut core = EngineCore::new();
    core.set_tool(Tool::Rect);
    let actions = gesture(&mut core, pt(10.0, 10.0), &[pt(50.0, 10.0), pt(50.0, 40.0)], pt(50.0, 40.0));

    let json = actions_to_json(&actions).expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    let list = value.as_array().expect("array");

    let committed = list
        .iter()
        .find(|a| a["type"] == "element_committed")
        .expect("element_committed action");
    let data = &committed["data"];
    assert_eq!(data["kind"], "rect");
    assert_eq!(data["origin"], serde_json::json!({"x": 10.0, "y": 10.0}));
    assert_eq!(data["width"], 40.0);
    assert_eq!(data["height"], 30.0);
    assert!(data["id"].is_string());

    // The host can forward the element to the room unchanged.
    let element: Element = serde_json::from_value(data.clone()).expect("element");
    assert_eq!(core.elements(), &[element]);
}

#[test]
fn empty_action_list_serializes_as_empty_array() {
    assert_eq!(actions_to_json(&[]).expect("serialize"), "[]");
}
