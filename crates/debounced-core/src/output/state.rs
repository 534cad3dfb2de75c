// Debounced Sink Key State
// Keys currently held on the virtual device

use crate::action::Action;
use crate::key::Keycode;
use std::collections::BTreeSet;

/// Tracks which keys the virtual device currently reports as held.
///
/// Covers every emitted key, including bypass keys the engines never
/// track, so teardown can leave nothing stuck.
#[derive(Debug, Clone, Default)]
pub struct PressedKeyState {
    pressed: BTreeSet<Keycode>,
}

impl PressedKeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from an emitted key event
    pub fn apply(&mut self, key: Keycode, action: Action) {
        match action {
            Action::Press => {
                self.pressed.insert(key);
            }
            Action::Release => {
                self.pressed.remove(&key);
            }
            Action::Repeat => {}
        }
    }

    /// Check if a key is currently pressed
    pub fn is_pressed(&self, key: Keycode) -> bool {
        self.pressed.contains(&key)
    }

    /// Take every pressed key, in keycode order, leaving the state empty
    pub fn drain(&mut self) -> Vec<Keycode> {
        std::mem::take(&mut self.pressed).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }
}
