// Debounced Core Library
// Keyboard chatter filtering and FlashTap resolution for evdev devices

pub mod action;
pub mod client;
pub mod config;
pub mod daemon;
pub mod event;
pub mod input;
pub mod key;
pub mod output;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod state;
pub mod timer;
pub mod transform;

// Test doubles shared by unit tests
#[cfg(test)]
mod testing;

pub use action::Action;
pub use client::{ClientError, ControlClient, Response};
pub use config::{ConfigError, DaemonConfig, Mode, PairSelection};
pub use daemon::{Backend, Daemon, DaemonError, EvdevBackend, LoopControl, StatusHandle};
pub use event::{control_channel, Control, ControlReceiver, ControlSender, EventLoopError, Reply};
pub use input::{list_keyboards, DeviceError, EvdevSource, KeySource, KeyboardInfo, RawKeyEvent};
pub use key::Keycode;
pub use output::{Emission, KeySink, PressedKeyState, SinkError, UinputSink};
pub use protocol::{Command, ProtocolError, StartRequest, StatusReport, REPLY_OK, REPLY_REJECTED};
pub use server::{ControlServer, ServerError, SocketGuard};
pub use settings::{Settings, SettingsError};
pub use state::{KeyRecord, KeyTimeline, PendingRelease};
pub use timer::{ExpiryTimer, TimerFd, TimerFdSource, TimerSource};
pub use transform::{DebounceAction, Debouncer, Engine, FlashPair};
