use glam::Vec2;

/// A camera action produced by any input device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraAction {
    /// Rotate around the target by a pointer delta in pixels.
    Orbit(Vec2),
    /// Dolly towards (negative) or away from (positive) the target, in wheel notches.
    Zoom(f32),
    /// Translate the target by a pointer delta in pixels.
    Pan(Vec2),
}

/// Pointer buttons the viewer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Turns button/cursor/wheel events into camera actions.
///
/// Primary drag orbits, secondary drag pans, middle drag dollies.
#[derive(Debug, Default)]
pub struct PointerTracker {
    primary: bool,
    secondary: bool,
    middle: bool,
    last_position: Option<Vec2>,
}

/// Pixels of middle-button drag that count as one wheel notch.
const DRAG_PIXELS_PER_NOTCH: f32 = 20.0;

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn button(&mut self, button: PointerButton, pressed: bool) {
        match button {
            PointerButton::Primary => self.primary = pressed,
            PointerButton::Secondary => self.secondary = pressed,
            PointerButton::Middle => self.middle = pressed,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.primary || self.secondary || self.middle
    }

    /// Record a new cursor position; yields an action while a button is held.
    pub fn cursor_moved(&mut self, position: Vec2) -> Option<CameraAction> {
        let previous = self.last_position.replace(position)?;
        let delta = position - previous;
        if delta == Vec2::ZERO {
            return None;
        }
        let action = if self.primary {
            CameraAction::Orbit(delta)
        } else if self.secondary {
            CameraAction::Pan(delta)
        } else if self.middle {
            CameraAction::Zoom(delta.y / DRAG_PIXELS_PER_NOTCH)
        } else {
            return None;
        };
        tracing::trace!(?action, "pointer action");
        Some(action)
    }

    /// Forget the cursor position, e.g. when it leaves the window.
    pub fn cursor_left(&mut self) {
        self.last_position = None;
    }

    pub fn wheel(&mut self, notches: f32) -> Option<CameraAction> {
        if notches == 0.0 {
            None
        } else {
            Some(CameraAction::Zoom(notches))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_action_without_button() {
        let mut t = PointerTracker::new();
        assert_eq!(t.cursor_moved(Vec2::new(10.0, 10.0)), None);
        assert_eq!(t.cursor_moved(Vec2::new(20.0, 10.0)), None);
    }

    #[test]
    fn primary_drag_orbits() {
        let mut t = PointerTracker::new();
        t.cursor_moved(Vec2::new(10.0, 10.0));
        t.button(PointerButton::Primary, true);
        assert_eq!(
            t.cursor_moved(Vec2::new(15.0, 8.0)),
            Some(CameraAction::Orbit(Vec2::new(5.0, -2.0)))
        );
        t.button(PointerButton::Primary, false);
        assert!(!t.is_dragging());
    }

    #[test]
    fn secondary_drag_pans() {
        let mut t = PointerTracker::new();
        t.cursor_moved(Vec2::ZERO);
        t.button(PointerButton::Secondary, true);
        assert!(matches!(
            t.cursor_moved(Vec2::new(1.0, 1.0)),
            Some(CameraAction::Pan(_))
        ));
    }

    #[test]
    fn middle_drag_zooms() {
        let mut t = PointerTracker::new();
        t.cursor_moved(Vec2::ZERO);
        t.button(PointerButton::Middle, true);
        assert_eq!(
            t.cursor_moved(Vec2::new(0.0, 40.0)),
            Some(CameraAction::Zoom(2.0))
        );
    }

    #[test]
    fn first_move_after_leave_has_no_delta() {
        let mut t = PointerTracker::new();
        t.button(PointerButton::Primary, true);
        t.cursor_moved(Vec2::ZERO);
        t.cursor_left();
        assert_eq!(t.cursor_moved(Vec2::new(500.0, 500.0)), None);
    }

    #[test]
    fn wheel_zero_is_ignored() {
        let mut t = PointerTracker::new();
        assert_eq!(t.wheel(0.0), None);
        assert_eq!(t.wheel(-1.0), Some(CameraAction::Zoom(-1.0)));
    }
}
