// Debounced Output Layer
// Virtual keyboard sink and held-key tracking

mod sink;
mod state;
mod uinput;

pub use sink::{Emission, KeySink, SinkError};
pub use state::PressedKeyState;
pub use uinput::UinputSink;
