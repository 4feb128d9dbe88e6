use eframe::egui::{pos2, Pos2, Vec2};

/// Movement (per axis) after which a press stops being a tap.
pub const DRAG_THRESHOLD: f32 = 5.0;
/// Distance kept from the viewport edge when a released widget is pulled back.
pub const EDGE_INSET: f32 = 10.0;

/// Where the widget is pinned. Starts bottom-relative; the first drag movement
/// switches it to absolute coordinates for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidgetAnchor {
    BottomLeft { left: f32, bottom: f32 },
    Absolute { left: f32, top: f32 },
}

impl WidgetAnchor {
    pub fn origin(&self, viewport: Vec2, widget_size: Vec2) -> Pos2 {
        match *self {
            WidgetAnchor::BottomLeft { left, bottom } => {
                pos2(left, viewport.y - bottom - widget_size.y)
            }
            WidgetAnchor::Absolute { left, top } => pos2(left, top),
        }
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, WidgetAnchor::Absolute { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGesture {
    pub start_pointer: Pos2,
    pub origin: Pos2,
    pub exceeded_threshold: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Still within the tap threshold.
    Pending,
    /// Threshold crossed at some point during this gesture.
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Tap,
    Drag,
}

#[derive(Debug, Clone)]
pub struct DragController {
    anchor: WidgetAnchor,
    gesture: Option<DragGesture>,
    threshold: f32,
    inset: f32,
}

impl DragController {
    pub fn new(anchor: WidgetAnchor, threshold: f32, inset: f32) -> Self {
        Self {
            anchor,
            gesture: None,
            threshold: threshold.max(0.0),
            inset: inset.max(0.0),
        }
    }

    pub fn anchor(&self) -> WidgetAnchor {
        self.anchor
    }

    #[cfg(test)]
    fn gesture(&self) -> Option<&DragGesture> {
        self.gesture.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// `true` while a gesture is active and has crossed the threshold.
    pub fn is_dragging(&self) -> bool {
        self.gesture.is_some_and(|g| g.exceeded_threshold)
    }

    /// Starts tracking a press. A start that arrives while another gesture is
    /// still open replaces it.
    pub fn on_gesture_start(&mut self, pointer: Pos2, widget_origin: Pos2) {
        if self.gesture.is_some() {
            tracing::debug!("gesture restarted before the previous one ended");
        }
        self.gesture = Some(DragGesture {
            start_pointer: pointer,
            origin: widget_origin,
            exceeded_threshold: false,
        });
    }

    pub fn on_gesture_move(&mut self, pointer: Pos2) -> Option<MoveOutcome> {
        let gesture = self.gesture.as_mut()?;
        let delta = pointer - gesture.start_pointer;
        if delta.x.abs() > self.threshold || delta.y.abs() > self.threshold {
            gesture.exceeded_threshold = true;
        }

        let origin = gesture.origin + delta;
        if !self.anchor.is_absolute() {
            tracing::debug!("widget switched to absolute positioning");
        }
        self.anchor = WidgetAnchor::Absolute {
            left: origin.x,
            top: origin.y,
        };

        Some(if gesture.exceeded_threshold {
            MoveOutcome::Dragging
        } else {
            MoveOutcome::Pending
        })
    }

    /// Ends the gesture and pulls the widget back inside `viewport`.
    pub fn on_gesture_end(&mut self, viewport: Vec2, widget_size: Vec2) -> Option<GestureOutcome> {
        let gesture = self.gesture.take()?;
        self.clamp_into(viewport, widget_size);
        Some(if gesture.exceeded_threshold {
            GestureOutcome::Drag
        } else {
            GestureOutcome::Tap
        })
    }

    /// Focus loss or the pointer leaving the window. Never yields a tap.
    pub fn on_gesture_cancel(&mut self, viewport: Vec2, widget_size: Vec2) {
        if self.gesture.take().is_some() {
            tracing::debug!("gesture cancelled");
            self.clamp_into(viewport, widget_size);
        }
    }

    fn clamp_into(&mut self, viewport: Vec2, widget_size: Vec2) {
        let origin = self.anchor.origin(viewport, widget_size);
        let clamped = clamp_to_viewport(origin, widget_size, viewport, self.inset);
        if clamped != origin {
            tracing::debug!(?origin, ?clamped, "widget pulled back into view");
            self.anchor = WidgetAnchor::Absolute {
                left: clamped.x,
                top: clamped.y,
            };
        }
    }
}

/// Each edge is checked independently; an edge outside the viewport moves
/// the widget so that edge sits `inset` away from the viewport edge.
pub fn clamp_to_viewport(origin: Pos2, size: Vec2, viewport: Vec2, inset: f32) -> Pos2 {
    let mut clamped = origin;
    if origin.x < 0.0 {
        clamped.x = inset;
    }
    if origin.y < 0.0 {
        clamped.y = inset;
    }
    if origin.x + size.x > viewport.x {
        clamped.x = viewport.x - size.x - inset;
    }
    if origin.y + size.y > viewport.y {
        clamped.y = viewport.y - size.y - inset;
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    const VIEWPORT: Vec2 = Vec2::new(1024.0, 768.0);
    const DISC: Vec2 = Vec2::new(60.0, 60.0);

    fn controller() -> DragController {
        DragController::new(
            WidgetAnchor::BottomLeft {
                left: 20.0,
                bottom: 20.0,
            },
            DRAG_THRESHOLD,
            EDGE_INSET,
        )
    }

    fn contained(origin: Pos2, size: Vec2, viewport: Vec2) -> bool {
        origin.x >= 0.0
            && origin.y >= 0.0
            && origin.x + size.x <= viewport.x
            && origin.y + size.y <= viewport.y
    }

    #[test]
    fn bottom_anchor_resolves_against_viewport_height() {
        let anchor = controller().anchor();
        assert_eq!(anchor.origin(VIEWPORT, DISC), pos2(20.0, 688.0));
        assert!(!anchor.is_absolute());
    }

    #[test]
    fn small_movement_is_a_tap() {
        let mut drag = controller();
        drag.on_gesture_start(pos2(50.0, 718.0), pos2(20.0, 688.0));
        assert_eq!(
            drag.on_gesture_move(pos2(53.0, 714.0)),
            Some(MoveOutcome::Pending)
        );
        assert_eq!(
            drag.on_gesture_move(pos2(55.0, 713.0)),
            Some(MoveOutcome::Pending)
        );
        assert!(!drag.is_dragging());
        assert_eq!(
            drag.on_gesture_end(VIEWPORT, DISC),
            Some(GestureOutcome::Tap)
        );
    }

    #[test]
    fn crossing_threshold_sticks_for_the_whole_gesture() {
        let mut drag = controller();
        drag.on_gesture_start(pos2(50.0, 718.0), pos2(20.0, 688.0));
        assert_eq!(
            drag.on_gesture_move(pos2(50.0, 712.0)),
            Some(MoveOutcome::Dragging)
        );
        // Coming back near the start does not turn it into a tap again.
        assert_eq!(
            drag.on_gesture_move(pos2(50.0, 718.0)),
            Some(MoveOutcome::Dragging)
        );
        assert!(drag.is_dragging());
        assert_eq!(
            drag.on_gesture_end(VIEWPORT, DISC),
            Some(GestureOutcome::Drag)
        );
        assert!(!drag.is_active());
    }

    #[test]
    fn movement_switches_anchor_permanently() {
        let mut drag = controller();
        drag.on_gesture_start(pos2(50.0, 718.0), pos2(20.0, 688.0));
        drag.on_gesture_move(pos2(51.0, 718.0));
        drag.on_gesture_end(VIEWPORT, DISC);
        assert_eq!(
            drag.anchor(),
            WidgetAnchor::Absolute {
                left: 21.0,
                top: 688.0
            }
        );
    }

    #[test]
    fn press_without_moves_keeps_bottom_anchor() {
        let mut drag = controller();
        drag.on_gesture_start(pos2(50.0, 718.0), pos2(20.0, 688.0));
        assert_eq!(
            drag.on_gesture_end(VIEWPORT, DISC),
            Some(GestureOutcome::Tap)
        );
        assert!(!drag.anchor().is_absolute());
    }

    #[test]
    fn drag_upwards_lands_where_released() {
        let mut drag = DragController::new(
            WidgetAnchor::Absolute {
                left: 20.0,
                top: 700.0,
            },
            DRAG_THRESHOLD,
            EDGE_INSET,
        );
        drag.on_gesture_start(pos2(50.0, 730.0), pos2(20.0, 700.0));
        drag.on_gesture_move(pos2(50.0, 640.0));
        drag.on_gesture_move(pos2(50.0, 580.0));
        assert_eq!(
            drag.on_gesture_end(VIEWPORT, DISC),
            Some(GestureOutcome::Drag)
        );
        assert_eq!(drag.anchor().origin(VIEWPORT, DISC), pos2(20.0, 550.0));
    }

    #[test]
    fn release_outside_viewport_is_clamped_per_edge() {
        let cases = [
            (pos2(-40.0, 300.0), pos2(10.0, 300.0)),
            (pos2(300.0, -15.0), pos2(300.0, 10.0)),
            (pos2(1000.0, 300.0), pos2(954.0, 300.0)),
            (pos2(300.0, 760.0), pos2(300.0, 698.0)),
            (pos2(-5.0, -5.0), pos2(10.0, 10.0)),
            (pos2(2000.0, 2000.0), pos2(954.0, 698.0)),
        ];
        for (released, expected) in cases {
            assert_eq!(
                clamp_to_viewport(released, DISC, VIEWPORT, EDGE_INSET),
                expected,
                "released at {released:?}"
            );
        }
    }

    #[test]
    fn inside_positions_are_left_alone() {
        let origin = pos2(3.0, 700.0);
        assert_eq!(clamp_to_viewport(origin, DISC, VIEWPORT, EDGE_INSET), origin);
    }

    #[test]
    fn every_drag_sequence_ends_inside_the_viewport() {
        let viewports = [vec2(1024.0, 768.0), vec2(320.0, 240.0), vec2(80.0, 80.0)];
        let steps = [-900.0, -130.0, -6.0, 0.0, 4.0, 75.0, 640.0, 1500.0];

        for viewport in viewports {
            for &dx in &steps {
                for &dy in &steps {
                    let mut drag = controller();
                    let origin = drag.anchor().origin(viewport, DISC);
                    let start = origin + DISC / 2.0;
                    drag.on_gesture_start(start, origin);
                    drag.on_gesture_move(start + vec2(dx / 2.0, dy * 0.3));
                    drag.on_gesture_move(start + vec2(dx, dy));
                    drag.on_gesture_end(viewport, DISC);

                    let landed = drag.anchor().origin(viewport, DISC);
                    assert!(
                        contained(landed, DISC, viewport),
                        "dx={dx} dy={dy} viewport={viewport:?} landed={landed:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn second_start_reinitializes_gesture() {
        let mut drag = controller();
        drag.on_gesture_start(pos2(50.0, 718.0), pos2(20.0, 688.0));
        drag.on_gesture_move(pos2(150.0, 600.0));
        assert!(drag.is_dragging());

        drag.on_gesture_start(pos2(10.0, 10.0), pos2(0.0, 0.0));
        let gesture = drag.gesture().copied().unwrap();
        assert!(!gesture.exceeded_threshold);
        assert_eq!(gesture.start_pointer, pos2(10.0, 10.0));
        assert_eq!(
            drag.on_gesture_end(VIEWPORT, DISC),
            Some(GestureOutcome::Tap)
        );
    }

    #[test]
    fn cancel_ends_gesture_and_clamps() {
        let mut drag = controller();
        drag.on_gesture_start(pos2(50.0, 718.0), pos2(20.0, 688.0));
        drag.on_gesture_move(pos2(-200.0, 718.0));
        drag.on_gesture_cancel(VIEWPORT, DISC);

        assert!(!drag.is_active());
        assert_eq!(drag.anchor().origin(VIEWPORT, DISC), pos2(10.0, 688.0));
        assert_eq!(drag.on_gesture_end(VIEWPORT, DISC), None);
    }

    #[test]
    fn moves_without_gesture_are_ignored() {
        let mut drag = controller();
        assert_eq!(drag.on_gesture_move(pos2(400.0, 400.0)), None);
        assert!(!drag.anchor().is_absolute());
    }
}
