// Debounced Input Source
// The physical device as seen by the multiplexer

use std::os::fd::RawFd;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::action::Action;
use crate::key::Keycode;

/// One `EV_KEY` event read from the physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: Keycode,
    pub value: i32,
    pub time: SystemTime,
}

impl RawKeyEvent {
    pub fn new(key: Keycode, action: Action, time: SystemTime) -> Self {
        Self {
            key,
            value: action.to_i32(),
            time,
        }
    }

    pub fn action(&self) -> Option<Action> {
        Action::from_i32(self.value)
    }
}

/// Errors opening or reading the physical device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to grab {path} (already grabbed by another process?): {source}")]
    Grab {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Device lost: {0}")]
    Lost(String),
}

/// An exclusively grabbed, event-producing physical device.
///
/// Dropping the source releases the grab.
pub trait KeySource {
    /// Descriptor that becomes readable when events are pending
    fn poll_fd(&self) -> Option<RawFd>;

    /// Read the events currently available, `EV_KEY` only.
    ///
    /// An empty batch means nothing was pending. An error means the
    /// device is gone.
    fn read_events(&mut self) -> Result<Vec<RawKeyEvent>, DeviceError>;

    /// Liveness probe
    fn is_alive(&self) -> bool;

    /// Keycodes above the addressable range the device can produce
    fn extra_keys(&self) -> Vec<u16>;
}
