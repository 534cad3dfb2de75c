// Debounced Transform Module
// Per-key decision logic for physical transitions

pub mod debounce;
pub mod engine;
pub mod flashtap;

pub use debounce::{DebounceAction, Debouncer};
pub use engine::{Emissions, Engine};
pub use flashtap::FlashPair;
