use std::fmt;

/// The value carried by an `EV_KEY` event.
///
/// From `evtest` output:
///   0 == 'released'
///   1 == 'pressed'
///   2 == 'repeated' (kernel autorepeat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Action {
    Release = 0,
    Press = 1,
    Repeat = 2,
}

impl Action {
    /// Returns true if the action is either PRESS or REPEAT
    pub fn is_down(self) -> bool {
        matches!(self, Action::Press | Action::Repeat)
    }

    /// Create Action from the raw event value
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Action::Release),
            1 => Some(Action::Press),
            2 => Some(Action::Repeat),
            _ => None,
        }
    }

    /// Convert Action to its raw event value
    pub fn to_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Release => write!(f, "UP"),
            Action::Press => write!(f, "DOWN"),
            Action::Repeat => write!(f, "REPEAT"),
        }
    }
}
