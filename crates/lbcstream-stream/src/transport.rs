//! `LogTransport`: the seam to whatever serves contract logs.
//!
//! A transport answers one-shot historical queries and opens live
//! subscriptions. A subscription delivers entries in ledger order on a
//! bounded queue, reports at most one terminal error, and is released
//! through its `SubscriptionHandle`.

use std::fmt;

use async_trait::async_trait;
use lbcstream_core::{error::TransportError, event::RawLog, filter::LogFilter};
use tokio::sync::{mpsc, oneshot};

#[async_trait]
pub trait LogTransport: Send + Sync {
    /// All logs matching `filter` within its block range, in ledger order.
    async fn fetch_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, TransportError>;

    /// Start a live subscription. The filter's block range is ignored.
    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError>;
}

/// An open live subscription.
///
/// The transport sends every entry on `logs` before it reports a terminal
/// error on `errors`. Dropping the error sender without a value, together
/// with closing `logs`, is a clean end.
pub struct LogSubscription {
    pub logs: mpsc::Receiver<RawLog>,
    pub errors: oneshot::Receiver<TransportError>,
    pub handle: SubscriptionHandle,
}

impl fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSubscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Releases a subscription exactly once, on `unsubscribe()` or on drop.
pub struct SubscriptionHandle {
    id: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(id: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id: id.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Release the subscription. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn release_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut handle = SubscriptionHandle::new("0x1", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(handle.is_active());
        handle.unsubscribe();
        handle.unsubscribe();
        assert!(!handle.is_active());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        drop(SubscriptionHandle::new("0x2", move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
