//! `HistoricalIterator`: pull-style consumption of past entries with an
//! optional live tail.
//!
//! `next()` never blocks. Historical results are delivered first; after that
//! the live queue is drained of whatever is already buffered and `None`
//! means "nothing right now". A terminal subscription error is surfaced only
//! once every queued entry has been delivered.

use std::collections::{HashSet, VecDeque};

use lbcstream_core::{
    error::{StreamError, TransportError},
    event::{DecodedEvent, RawLog},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::criteria::EventDecoder;
use crate::metrics::SharedMetrics;
use crate::transport::{LogSubscription, SubscriptionHandle};

type LogKey = (String, String, u32);

struct LiveTail {
    logs: mpsc::Receiver<RawLog>,
    errors: oneshot::Receiver<TransportError>,
    handle: SubscriptionHandle,
    /// Terminal error already taken from `errors`, held until `logs` is drained.
    failure: Option<TransportError>,
}

pub struct HistoricalIterator {
    pending: VecDeque<RawLog>,
    live: Option<LiveTail>,
    decoder: EventDecoder,
    /// Historical entries a live tail may repeat.
    delivered: HashSet<LogKey>,
    peeked: Option<DecodedEvent>,
    error: Option<StreamError>,
    done: bool,
    closed: bool,
    metrics: SharedMetrics,
}

impl HistoricalIterator {
    pub(crate) fn new(
        historical: Vec<RawLog>,
        live: Option<LogSubscription>,
        decoder: EventDecoder,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            pending: historical.into(),
            live: live.map(|s| LiveTail {
                logs: s.logs,
                errors: s.errors,
                handle: s.handle,
                failure: None,
            }),
            decoder,
            delivered: HashSet::new(),
            peeked: None,
            error: None,
            done: false,
            closed: false,
            metrics,
        }
    }

    /// Whether `next()` would yield an entry right now.
    ///
    /// In follow mode `false` may be temporary; `is_done()` tells the two apart.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() && !self.done && !self.closed {
            self.peeked = self.advance();
        }
        self.peeked.is_some()
    }

    /// The terminal error, if iteration stopped because of one.
    pub fn last_error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// No further entries will ever be produced.
    pub fn is_done(&self) -> bool {
        self.peeked.is_none() && (self.done || self.closed)
    }

    /// Whether a live subscription is still attached.
    pub fn is_following(&self) -> bool {
        self.live.is_some()
    }

    /// Release the subscription and discard anything still buffered.
    /// Safe to call repeatedly and after a terminal state.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        self.peeked = None;
        self.release();
    }

    fn advance(&mut self) -> Option<DecodedEvent> {
        if let Some(raw) = self.pending.pop_front() {
            if self.live.is_some() {
                self.delivered.insert(raw.provenance.log_key());
            }
            return self.decode(raw);
        }

        loop {
            let live = match self.live.as_mut() {
                Some(live) => live,
                None => {
                    self.done = true;
                    return None;
                }
            };

            match live.logs.try_recv() {
                Ok(raw) => {
                    if !self.delivered.is_empty() && self.delivered.remove(&raw.provenance.log_key()) {
                        debug!(block = raw.provenance.block_number, "skipping entry already delivered historically");
                        self.metrics.update(|m| m.duplicates_skipped += 1);
                        continue;
                    }
                    return self.decode(raw);
                }
                Err(status) => {
                    if live.failure.is_none() {
                        if let Ok(err) = live.errors.try_recv() {
                            // entries queued ahead of the error may have landed since the last look
                            live.failure = Some(err);
                            continue;
                        }
                    }
                    if let Some(err) = live.failure.take() {
                        return self.fail(err.into());
                    }
                    if status == mpsc::error::TryRecvError::Disconnected {
                        debug!("live subscription ended");
                        self.done = true;
                        self.release();
                    }
                    return None;
                }
            }
        }
    }

    fn decode(&mut self, raw: RawLog) -> Option<DecodedEvent> {
        match self.decoder.decode(&raw) {
            Ok(event) => {
                self.metrics.update(|m| m.events_decoded += 1);
                Some(event)
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn fail(&mut self, err: StreamError) -> Option<DecodedEvent> {
        warn!(error = %err, "historical iterator stopped");
        self.metrics.update(|m| match &err {
            StreamError::Decode(_) => m.decode_errors += 1,
            StreamError::Transport(_) => m.transport_errors += 1,
            _ => {}
        });
        self.release();
        self.pending.clear();
        self.error = Some(err);
        self.done = true;
        None
    }

    fn release(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.handle.unsubscribe();
        }
        self.delivered.clear();
    }
}

impl Iterator for HistoricalIterator {
    type Item = DecodedEvent;

    /// Next entry, or `None` if nothing is available right now.
    fn next(&mut self) -> Option<DecodedEvent> {
        if self.peeked.is_none() && !self.done && !self.closed {
            return self.advance();
        }
        self.peeked.take()
    }
}

impl Drop for HistoricalIterator {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for HistoricalIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoricalIterator")
            .field("pending", &self.pending.len())
            .field("following", &self.live.is_some())
            .field("done", &self.done)
            .field("closed", &self.closed)
            .field("error", &self.error)
            .finish()
    }
}
