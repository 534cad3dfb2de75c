// Debounced FlashTap
// Simultaneous opposing cardinal direction resolution: last press wins

use smallvec::{smallvec, SmallVec};
use std::time::SystemTime;

use crate::action::Action;
use crate::key::Keycode;
use crate::output::Emission;

/// Emissions produced by one FlashTap transition (at most two)
pub type FlashEmissions = SmallVec<[Emission; 2]>;

/// Two opposing keys of which at most one is asserted at a time.
///
/// `physical` tracks the raw state of each member regardless of what was
/// emitted; `active` is the member currently held on the virtual sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPair {
    key_a: Keycode,
    key_b: Keycode,
    active: Option<Keycode>,
    physical: [bool; 2],
}

impl FlashPair {
    pub fn new(key_a: Keycode, key_b: Keycode) -> Self {
        Self {
            key_a,
            key_b,
            active: None,
            physical: [false, false],
        }
    }

    pub fn contains(&self, key: Keycode) -> bool {
        key == self.key_a || key == self.key_b
    }

    pub fn active(&self) -> Option<Keycode> {
        self.active
    }

    pub fn is_physically_down(&self, key: Keycode) -> bool {
        self.slot(key).is_some_and(|idx| self.physical[idx])
    }

    fn slot(&self, key: Keycode) -> Option<usize> {
        if key == self.key_a {
            Some(0)
        } else if key == self.key_b {
            Some(1)
        } else {
            None
        }
    }

    /// Apply one physical transition of a member key
    pub fn on_event(&mut self, key: Keycode, action: Action, time: SystemTime) -> FlashEmissions {
        let Some(idx) = self.slot(key) else {
            return SmallVec::new();
        };
        let other = if idx == 0 { self.key_b } else { self.key_a };

        match action {
            Action::Press => {
                self.physical[idx] = true;
                if self.active == Some(key) {
                    return SmallVec::new();
                }

                let mut out = FlashEmissions::new();
                if self.active == Some(other) {
                    out.push(Emission::new(other, Action::Release, time));
                    log::debug!("[FT] Released {} due to {} press", other, key);
                }
                self.active = Some(key);
                out.push(Emission::new(key, Action::Press, time));
                log::debug!("[FT] {} DOWN", key);
                out
            }
            Action::Release => {
                self.physical[idx] = false;
                if self.active != Some(key) {
                    // Already overridden out; the consumer never sees it.
                    return SmallVec::new();
                }

                let mut out: FlashEmissions = smallvec![Emission::new(key, Action::Release, time)];
                self.active = None;
                log::debug!("[FT] {} UP", key);
                if self.physical[1 - idx] {
                    self.active = Some(other);
                    out.push(Emission::new(other, Action::Press, time));
                    log::debug!("[FT] {} restored to DOWN due to {} release", other, key);
                }
                out
            }
            Action::Repeat => {
                if self.active == Some(key) {
                    smallvec![Emission::new(key, Action::Repeat, time)]
                } else {
                    SmallVec::new()
                }
            }
        }
    }

    /// Release whichever member is asserted and forget physical state
    pub fn release_all(&mut self, time: SystemTime) -> Option<Emission> {
        self.physical = [false, false];
        self.active
            .take()
            .map(|key| Emission::new(key, Action::Release, time))
    }
}
