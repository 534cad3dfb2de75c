// Debounced Output Sink
// The only path by which synthesized key events leave the engine

use std::time::SystemTime;

use crate::action::Action;
use crate::key::Keycode;

/// One key event to write to the virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emission {
    pub key: Keycode,
    pub action: Action,
    /// Event time carried to the consumer
    pub time: SystemTime,
}

impl Emission {
    pub fn new(key: Keycode, action: Action, time: SystemTime) -> Self {
        Self { key, action, time }
    }
}

/// Error types for output operations
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to create virtual device: {0}")]
    DeviceCreation(String),

    #[error("Failed to write event: {0}")]
    WriteError(String),
}

/// Destination for cleaned key events.
///
/// Every emitted key event is followed by a synchronization marker.
pub trait KeySink {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError>;

    /// Release anything still held on the sink
    fn release_all(&mut self) -> Result<(), SinkError>;
}
