// Debounced Status Snapshot
// Written by the engine thread, read by the control listener

use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol::StatusReport;

/// Shared, cheaply cloneable view of the daemon's run state.
///
/// Only the engine-owning thread writes it; STATUS is answered from it
/// without a round trip through the control queue.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<StatusReport>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StatusReport {
        *self.inner.read()
    }

    pub(crate) fn set(&self, report: StatusReport) {
        *self.inner.write() = report;
    }
}
