// Debounced Event Handling
// Control queue and the poll-based multiplexer

pub mod control;
pub mod r#loop;

pub use control::{control_channel, Control, ControlReceiver, ControlSender, Reply};
pub use r#loop::{EventLoopError, EventLoopResult, Multiplexer, Readiness};
