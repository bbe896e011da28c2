//! Keyboard commands and drag-to-scale handling.

use winit::keyboard::KeyCode;

/// Drag distance that maps to a scale factor of 1.
const DRAG_UNIT: f32 = 2.0;

/// Smallest drag, in pixels, that changes the scale.
const MIN_DRAG: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ToggleRotation,
    ToggleLight,
    Exit,
}

pub fn command_for_key(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::KeyR => Some(Command::ToggleRotation),
        KeyCode::KeyL => Some(Command::ToggleLight),
        KeyCode::Escape => Some(Command::Exit),
        _ => None,
    }
}

/// Left-button drag that sets the scene scale factor.
///
/// The anchor is the first cursor position seen while the button is held.
/// With `distance` the length of the drag from the anchor, dragging upwards
/// yields `2 / distance` and any other direction `distance / 2`. Releasing
/// the button clears the anchor.
#[derive(Clone, Copy, Debug, Default)]
pub struct DragScale {
    held: bool,
    anchor: Option<(f32, f32)>,
}

impl DragScale {
    pub fn press(&mut self) {
        self.held = true;
    }

    pub fn release(&mut self) {
        self.held = false;
        self.anchor = None;
    }

    /// Feed a cursor position (window pixels, y down). Returns the new scale
    /// factor when the drag changes it.
    pub fn moved(&mut self, x: f32, y: f32) -> Option<f32> {
        if !self.held {
            return None;
        }
        let Some((ax, ay)) = self.anchor else {
            self.anchor = Some((x, y));
            return None;
        };
        let dx = ax - x;
        let dy = ay - y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < MIN_DRAG {
            return None;
        }
        Some(if dy > 0.0 {
            DRAG_UNIT / distance
        } else {
            distance / DRAG_UNIT
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for_key(KeyCode::KeyR), Some(Command::ToggleRotation));
        assert_eq!(command_for_key(KeyCode::KeyL), Some(Command::ToggleLight));
        assert_eq!(command_for_key(KeyCode::Escape), Some(Command::Exit));
        assert_eq!(command_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn drag_up_shrinks_and_drag_down_grows() {
        let mut drag = DragScale::default();
        drag.press();
        assert_eq!(drag.moved(100.0, 100.0), None);
        // 40 px up
        assert_eq!(drag.moved(100.0, 60.0), Some(0.05));
        // 40 px down
        assert_eq!(drag.moved(100.0, 140.0), Some(20.0));
        // Sideways counts as "not up".
        assert_eq!(drag.moved(130.0, 100.0), Some(15.0));
    }

    #[test]
    fn moves_without_button_are_ignored() {
        let mut drag = DragScale::default();
        assert_eq!(drag.moved(10.0, 10.0), None);
        assert_eq!(drag.moved(50.0, 50.0), None);
    }

    #[test]
    fn release_resets_the_anchor() {
        let mut drag = DragScale::default();
        drag.press();
        drag.moved(0.0, 0.0);
        assert_eq!(drag.moved(0.0, 10.0), Some(5.0));
        drag.release();
        drag.press();
        // New anchor, so the first move yields nothing and distances restart.
        assert_eq!(drag.moved(0.0, 10.0), None);
        assert_eq!(drag.moved(0.0, 14.0), Some(2.0));
        // Zero-length drag leaves the scale alone.
        assert_eq!(drag.moved(0.0, 10.0), None);
    }
}
