//! `EventStream`: the entry point tying a transport, the registry and a
//! codec together.

use std::sync::Arc;

use lbcstream_core::{
    codec::ValueCodec,
    error::{StreamError, TransportError},
    event::{DecodedEvent, RawLog},
    filter::{LogFilter, SubscriptionCriteria},
};
use lbcstream_registry::EventRegistry;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::criteria::{self, CompiledCriteria};
use crate::forwarder::{self, ForwarderHandle};
use crate::iterator::HistoricalIterator;
use crate::metrics::{SharedMetrics, StreamMetrics};
use crate::transport::LogTransport;

/// Opens historical iterators and live forwarders over one contract.
///
/// # Usage
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use lbcstream_core::filter::SubscriptionCriteria;
/// use lbcstream_evm::EvmCodec;
/// use lbcstream_registry::lbc_registry;
/// use lbcstream_stream::{EventStream, EvmWsTransport, StreamConfig};
///
/// let config = StreamConfig::new("wss://public-node.rsk.co/websocket");
/// let transport = EvmWsTransport::connect(&config).await?;
/// let stream = EventStream::new(
///     Arc::new(transport),
///     Arc::new(lbc_registry()?),
///     Arc::new(EvmCodec),
///     config,
/// );
/// let mut deposits = stream
///     .open_historical_iterator(&SubscriptionCriteria::new("PegOutDeposit").from_block(1), false)
///     .await?;
/// for event in deposits.by_ref() {
///     println!("{} at block {}", event.kind, event.provenance.block_number);
/// }
/// if let Some(err) = deposits.last_error() {
///     eprintln!("stopped: {err}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventStream {
    transport: Arc<dyn LogTransport>,
    registry: Arc<EventRegistry>,
    codec: Arc<dyn ValueCodec>,
    config: StreamConfig,
    metrics: SharedMetrics,
}

impl EventStream {
    pub fn new(
        transport: Arc<dyn LogTransport>,
        registry: Arc<EventRegistry>,
        codec: Arc<dyn ValueCodec>,
        config: StreamConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            codec,
            config,
            metrics: SharedMetrics::default(),
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Returns a snapshot of current metrics.
    pub fn metrics(&self) -> StreamMetrics {
        self.metrics.snapshot()
    }

    /// Open a pull iterator over entries matching `criteria`.
    ///
    /// With `follow`, the live subscription is opened before the historical
    /// query so nothing emitted in between is missed; live entries the
    /// historical phase already returned are skipped. A live tail has no
    /// upper block, so `follow` together with `to_block` is rejected.
    pub async fn open_historical_iterator(
        &self,
        criteria: &SubscriptionCriteria,
        follow: bool,
    ) -> Result<HistoricalIterator, StreamError> {
        if follow {
            if let Some(to) = criteria.to_block {
                return Err(StreamError::InvalidCriteria(format!(
                    "cannot follow past an upper bound (to_block {to})"
                )));
            }
        }
        let CompiledCriteria { filter, decoder } = self.compile(criteria)?;

        let live = if follow {
            Some(
                self.transport
                    .subscribe_logs(&filter)
                    .await
                    .map_err(|e| self.transport_failed(e))?,
            )
        } else {
            None
        };

        // On failure `live` is dropped here, which releases the subscription.
        let historical = self.fetch_chunked(&filter).await?;
        info!(
            kinds = ?decoder.kinds(),
            entries = historical.len(),
            follow,
            "historical iterator opened"
        );
        Ok(HistoricalIterator::new(historical, live, decoder, self.metrics.clone()))
    }

    /// Subscribe and spawn a task forwarding decoded entries into `sink`.
    ///
    /// Subscription failures are returned here; failures after that are
    /// reported by `ForwarderHandle::wait`.
    pub async fn start_live_forwarder(
        &self,
        criteria: &SubscriptionCriteria,
        sink: mpsc::Sender<DecodedEvent>,
    ) -> Result<ForwarderHandle, StreamError> {
        let CompiledCriteria { filter, decoder } = self.compile(criteria)?;
        let subscription = self
            .transport
            .subscribe_logs(&filter)
            .await
            .map_err(|e| self.transport_failed(e))?;
        Ok(forwarder::spawn(subscription, decoder, sink, self.metrics.clone()))
    }

    fn compile(&self, criteria: &SubscriptionCriteria) -> Result<CompiledCriteria, StreamError> {
        criteria::compile(
            criteria,
            &self.registry,
            Arc::clone(&self.codec),
            self.config.contract_address.as_deref(),
        )
    }

    /// Issue the historical query, split into spans of at most
    /// `max_block_range` blocks when the upper bound is known.
    async fn fetch_chunked(&self, filter: &LogFilter) -> Result<Vec<RawLog>, StreamError> {
        let max_range = self.config.max_block_range;
        let result = match (filter.from_block, filter.to_block) {
            (Some(from), Some(to)) if max_range > 0 && to - from >= max_range => {
                let mut all = Vec::new();
                let mut start = from;
                loop {
                    let end = start.saturating_add(max_range - 1).min(to);
                    debug!(from = start, to = end, "fetching log chunk");
                    match self.transport.fetch_logs(&filter.with_range(start, end)).await {
                        Ok(chunk) => all.extend(chunk),
                        Err(e) => break Err(e),
                    }
                    if end >= to {
                        break Ok(all);
                    }
                    start = end + 1;
                }
            }
            _ => self.transport.fetch_logs(filter).await,
        };
        result.map_err(|e| self.transport_failed(e))
    }

    fn transport_failed(&self, e: TransportError) -> StreamError {
        self.metrics.update(|m| m.transport_errors += 1);
        StreamError::Transport(e)
    }
}
