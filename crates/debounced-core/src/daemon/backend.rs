// Debounced Daemon Backend
// Resource factory for a session: physical device, virtual sink, timers

use std::path::Path;

use crate::input::{DeviceError, EvdevSource, KeySource};
use crate::output::{KeySink, SinkError, UinputSink};
use crate::timer::{TimerFdSource, TimerSource};

/// Acquires the OS resources a session runs on.
///
/// The daemon only talks to these traits, so the lifecycle can be driven
/// without hardware.
pub trait Backend {
    type Source: KeySource;
    type Sink: KeySink;
    type Timers: TimerSource;

    /// Open and exclusively grab the physical device
    fn open_source(&mut self, path: &Path) -> Result<Self::Source, DeviceError>;

    /// Create the virtual keyboard, advertising `extra_keys` too
    fn create_sink(&mut self, name: &str, extra_keys: &[u16]) -> Result<Self::Sink, SinkError>;

    fn timers(&mut self) -> Self::Timers;
}

/// evdev grab, uinput output and timerfd expiry
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevBackend;

impl Backend for EvdevBackend {
    type Source = EvdevSource;
    type Sink = UinputSink;
    type Timers = TimerFdSource;

    fn open_source(&mut self, path: &Path) -> Result<EvdevSource, DeviceError> {
        EvdevSource::open(path)
    }

    fn create_sink(&mut self, name: &str, extra_keys: &[u16]) -> Result<UinputSink, SinkError> {
        UinputSink::new(name, extra_keys)
    }

    fn timers(&mut self) -> TimerFdSource {
        TimerFdSource
    }
}
