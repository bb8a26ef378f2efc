//! Scripted in-memory `LogTransport` and log builders shared by the
//! streaming tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::U256;
use async_trait::async_trait;
use lbcstream_core::{
    error::TransportError,
    event::{Provenance, RawLog},
    filter::LogFilter,
};
use lbcstream_evm::EvmCodec;
use lbcstream_registry::lbc_registry;
use lbcstream_stream::{EventStream, LogSubscription, LogTransport, StreamConfig, SubscriptionHandle};
use tokio::sync::{mpsc, oneshot};

pub const REGISTER_TOPIC: &str = "0xa9d44d6e13bb3fee938c3f66d1103e91f8dc6b12d4405a55eea558e8f275aa6e";
pub const WITHDRAWAL_TOPIC: &str = "0x7fcf532c15f0a6db0bd6d0e038bea71d30d808c7d98cb3bf7268a95bf5081b65";

// ─── Log builders ─────────────────────────────────────────────────────────────

pub fn provenance(block: u64, log_index: u32) -> Provenance {
    Provenance {
        address: "0xc2a630c053d12d63d32b025082f6ba268db18300".into(),
        block_number: block,
        block_hash: format!("0x{block:064x}"),
        tx_hash: format!("0x{:064x}", block * 1_000 + log_index as u64),
        tx_index: 0,
        log_index,
        removed: false,
    }
}

pub fn addr_topic(byte: u8) -> String {
    format!("0x{}{}", "00".repeat(12), hex::encode([byte; 20]))
}

pub fn register_data(id: u64, amount: u64) -> Vec<u8> {
    DynSolValue::Tuple(vec![
        DynSolValue::Uint(U256::from(id), 256),
        DynSolValue::Uint(U256::from(amount), 256),
    ])
    .abi_encode_params()
}

/// `Register(uint256 id, address indexed from, uint256 amount)`
pub fn register_log(id: u64, from: u8, amount: u64, block: u64) -> RawLog {
    RawLog {
        topics: vec![REGISTER_TOPIC.into(), addr_topic(from)],
        data: register_data(id, amount),
        provenance: provenance(block, 0),
    }
}

/// A Register entry whose payload is one byte short.
pub fn short_register_log(block: u64) -> RawLog {
    let mut log = register_log(3, 0xcc, 1, block);
    log.data.pop();
    log
}

/// A well-formed Withdrawal entry, i.e. a kind the criteria did not select.
pub fn withdrawal_log(block: u64) -> RawLog {
    RawLog {
        topics: vec![WITHDRAWAL_TOPIC.into()],
        data: register_data(0xdd, 5),
        provenance: provenance(block, 0),
    }
}

pub fn id_of(event: &lbcstream_core::event::DecodedEvent) -> u128 {
    event.field("id").and_then(|v| v.as_u128()).expect("id field")
}

// ─── Mock transport ───────────────────────────────────────────────────────────

/// Scripted behaviour of the next live subscription.
#[derive(Debug, Clone)]
pub enum LiveItem {
    Log(RawLog),
    Fail(TransportError),
    /// Close the queue and drop the error sender.
    End,
}

/// Senders of a subscription the script left open.
pub struct LiveFeed {
    pub logs: mpsc::Sender<RawLog>,
    pub errors: Option<oneshot::Sender<TransportError>>,
}

impl LiveFeed {
    pub async fn push(&self, log: RawLog) {
        self.logs.send(log).await.expect("subscription queue open");
    }

    pub fn fail(&mut self, err: TransportError) {
        let _ = self.errors.take().expect("error not yet sent").send(err);
    }
}

#[derive(Default)]
pub struct MockTransport {
    pub historical: Vec<RawLog>,
    pub fetch_failure: Option<TransportError>,
    pub subscribe_failure: Option<TransportError>,
    pub live_script: Vec<LiveItem>,
    /// Call order, e.g. ["subscribe", "fetch"]
    pub calls: Mutex<Vec<&'static str>>,
    pub fetches: Mutex<Vec<LogFilter>>,
    pub subscriptions: Mutex<Vec<LogFilter>>,
    pub feeds: Mutex<Vec<LiveFeed>>,
    pub unsubscribes: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn with_history(historical: Vec<RawLog>) -> Self {
        Self {
            historical,
            ..Default::default()
        }
    }

    pub fn live(mut self, script: Vec<LiveItem>) -> Self {
        self.live_script = script;
        self
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.unsubscribes)
    }

    /// Feed of the most recent subscription that the script left open.
    pub fn take_feed(&self) -> LiveFeed {
        self.feeds.lock().unwrap().pop().expect("an open subscription")
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogTransport for MockTransport {
    async fn fetch_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, TransportError> {
        self.calls.lock().unwrap().push("fetch");
        self.fetches.lock().unwrap().push(filter.clone());
        if let Some(e) = &self.fetch_failure {
            return Err(e.clone());
        }
        let from = filter.from_block.unwrap_or(0);
        let to = filter.to_block.unwrap_or(u64::MAX);
        Ok(self
            .historical
            .iter()
            .filter(|l| (from..=to).contains(&l.provenance.block_number))
            .cloned()
            .collect())
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError> {
        self.calls.lock().unwrap().push("subscribe");
        self.subscriptions.lock().unwrap().push(filter.clone());
        if let Some(e) = &self.subscribe_failure {
            return Err(e.clone());
        }

        let (logs_tx, logs) = mpsc::channel(64);
        let (errors_tx, errors) = oneshot::channel();
        let mut logs_tx = Some(logs_tx);
        let mut errors_tx = Some(errors_tx);
        for item in &self.live_script {
            match item {
                LiveItem::Log(raw) => {
                    if let Some(tx) = &logs_tx {
                        tx.try_send(raw.clone()).expect("script fits the queue");
                    }
                }
                LiveItem::Fail(e) => {
                    if let Some(tx) = errors_tx.take() {
                        let _ = tx.send(e.clone());
                    }
                }
                LiveItem::End => {
                    logs_tx = None;
                    errors_tx = None;
                }
            }
        }
        if let Some(logs) = logs_tx {
            self.feeds.lock().unwrap().push(LiveFeed {
                logs,
                errors: errors_tx,
            });
        }

        let counter = Arc::clone(&self.unsubscribes);
        let n = self.subscriptions.lock().unwrap().len();
        Ok(LogSubscription {
            logs,
            errors,
            handle: SubscriptionHandle::new(format!("0x{n:x}"), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        })
    }
}

pub fn event_stream(transport: Arc<MockTransport>) -> EventStream {
    event_stream_with(transport, StreamConfig::new("ws://127.0.0.1:4445"))
}

pub fn event_stream_with(transport: Arc<MockTransport>, config: StreamConfig) -> EventStream {
    EventStream::new(
        transport,
        Arc::new(lbc_registry().expect("catalogue loads")),
        Arc::new(EvmCodec),
        config,
    )
}
