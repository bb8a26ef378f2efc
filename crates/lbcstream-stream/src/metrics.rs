//! Counters shared by every consumer of one `EventStream`.

use std::sync::{Arc, Mutex, PoisonError};

/// Metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetrics {
    pub events_decoded: u64,
    pub decode_errors: u64,
    pub transport_errors: u64,
    /// Live entries dropped because the historical phase already delivered them
    pub duplicates_skipped: u64,
    pub forwarders_started: u64,
    pub forwarders_stopped: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SharedMetrics(Arc<Mutex<StreamMetrics>>);

impl SharedMetrics {
    pub(crate) fn update(&self, f: impl FnOnce(&mut StreamMetrics)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub(crate) fn snapshot(&self) -> StreamMetrics {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
