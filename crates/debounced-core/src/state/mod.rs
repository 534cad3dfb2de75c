// Debounced Key State
// Per-keycode timeline owned by the engine

mod timeline;

pub use timeline::{KeyRecord, KeyTimeline, PendingRelease};
