// Debounced Engine Configuration
// Tuning handed to the engine at START, never persisted

mod daemon;

pub use daemon::{clamp_timeout, ConfigError, DaemonConfig, Mode, PairSelection};
