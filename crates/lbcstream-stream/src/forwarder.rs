//! `LiveForwarder`: a background task pushing decoded live entries into a
//! caller-supplied sink.

use lbcstream_core::{
    error::{StreamError, TransportError},
    event::{DecodedEvent, RawLog},
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::criteria::EventDecoder;
use crate::metrics::SharedMetrics;
use crate::transport::LogSubscription;

/// Controls one running forwarder. Dropping it cancels the forwarder.
#[derive(Debug)]
pub struct ForwarderHandle {
    cancel: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<(), StreamError>>,
}

impl ForwarderHandle {
    /// Ask the forwarder to stop. It ends with `Ok(())`. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the forwarder to stop and return how it ended.
    ///
    /// `Ok(())` after cancellation or a clean end of the subscription; the
    /// terminal transport or decode error otherwise.
    pub async fn wait(mut self) -> Result<(), StreamError> {
        // keep the cancel sender alive while waiting
        let _cancel = self.cancel.take();
        match (&mut self.join).await {
            Ok(outcome) => outcome,
            Err(e) => Err(StreamError::Task(e.to_string())),
        }
    }
}

impl Drop for ForwarderHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub(crate) fn spawn(
    subscription: LogSubscription,
    decoder: EventDecoder,
    sink: mpsc::Sender<DecodedEvent>,
    metrics: SharedMetrics,
) -> ForwarderHandle {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    metrics.update(|m| m.forwarders_started += 1);
    let join = tokio::spawn(run(subscription, decoder, sink, cancel_rx, metrics));
    ForwarderHandle {
        cancel: Some(cancel_tx),
        join,
    }
}

async fn run(
    subscription: LogSubscription,
    decoder: EventDecoder,
    sink: mpsc::Sender<DecodedEvent>,
    mut cancel: oneshot::Receiver<()>,
    metrics: SharedMetrics,
) -> Result<(), StreamError> {
    let LogSubscription {
        mut logs,
        mut errors,
        mut handle,
    } = subscription;
    info!(subscription = handle.id(), kinds = ?decoder.kinds(), "live forwarder started");

    let outcome = forward(&mut logs, &mut errors, &decoder, &sink, &mut cancel, &metrics).await;
    handle.unsubscribe();

    metrics.update(|m| {
        m.forwarders_stopped += 1;
        match &outcome {
            Err(StreamError::Decode(_)) => m.decode_errors += 1,
            Err(StreamError::Transport(_)) => m.transport_errors += 1,
            _ => {}
        }
    });
    match &outcome {
        Ok(()) => info!(subscription = handle.id(), "live forwarder stopped"),
        Err(e) => warn!(subscription = handle.id(), error = %e, "live forwarder failed"),
    }
    outcome
}

async fn forward(
    logs: &mut mpsc::Receiver<RawLog>,
    errors: &mut oneshot::Receiver<TransportError>,
    decoder: &EventDecoder,
    sink: &mpsc::Sender<DecodedEvent>,
    cancel: &mut oneshot::Receiver<()>,
    metrics: &SharedMetrics,
) -> Result<(), StreamError> {
    let mut logs_open = true;
    let mut errors_open = true;
    let mut failure: Option<TransportError> = None;
    loop {
        // Once the terminal error is in hand, whatever is still queued goes out first.
        if let Some(err) = failure.take() {
            match logs.try_recv() {
                Ok(raw) => {
                    failure = Some(err);
                    if !deliver(&raw, decoder, sink, cancel, errors, &mut errors_open, metrics).await? {
                        return Ok(());
                    }
                    continue;
                }
                Err(_) => return Err(StreamError::Transport(err)),
            }
        }
        if !logs_open && !errors_open {
            debug!("subscription closed by transport");
            return Ok(());
        }

        // Queued entries win over a pending error so nothing buffered is lost.
        let raw = tokio::select! {
            biased;
            _ = &mut *cancel => return Ok(()),
            raw = logs.recv(), if logs_open => match raw {
                Some(raw) => raw,
                None => {
                    logs_open = false;
                    continue;
                }
            },
            err = &mut *errors, if errors_open => {
                errors_open = false;
                if let Ok(e) = err {
                    failure = Some(e);
                }
                continue;
            },
        };

        if !deliver(&raw, decoder, sink, cancel, errors, &mut errors_open, metrics).await? {
            return Ok(());
        }
    }
}

/// Decode one entry and hand it to the sink. `Ok(false)` means the forwarder
/// should stop quietly: cancelled, or nobody is reading the sink any more.
async fn deliver(
    raw: &RawLog,
    decoder: &EventDecoder,
    sink: &mpsc::Sender<DecodedEvent>,
    cancel: &mut oneshot::Receiver<()>,
    errors: &mut oneshot::Receiver<TransportError>,
    errors_open: &mut bool,
    metrics: &SharedMetrics,
) -> Result<bool, StreamError> {
    let event = decoder.decode(raw)?;
    metrics.update(|m| m.events_decoded += 1);

    // Delivery races cancellation and the subscription's terminal error.
    loop {
        tokio::select! {
            biased;
            _ = &mut *cancel => return Ok(false),
            permit = sink.reserve() => match permit {
                Ok(permit) => {
                    permit.send(event);
                    return Ok(true);
                }
                Err(_) => {
                    debug!("sink receiver dropped, stopping forwarder");
                    return Ok(false);
                }
            },
            err = &mut *errors, if *errors_open => match err {
                Ok(e) => return Err(StreamError::Transport(e)),
                Err(_) => *errors_open = false,
            },
        }
    }
}
