//! `EvmWsTransport`: `LogTransport` over an Ethereum JSON-RPC WebSocket.
//!
//! One background task owns the socket. Callers talk to it through a
//! command channel; responses are matched to requests by JSON-RPC id, and
//! `eth_subscription` notifications are routed to the subscription's
//! delivery queue. There is no reconnect: when the socket drops, every open
//! subscription receives a terminal `TransportError` and every in-flight
//! request fails.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lbcstream_core::{
    error::TransportError,
    event::{Provenance, RawLog},
    filter::LogFilter,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::transport::{LogSubscription, LogTransport, SubscriptionHandle};

// ─── Wire types ───────────────────────────────────────────────────────────────

/// A log as returned by `eth_getLogs` and `eth_subscription`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
    #[serde(rename = "blockHash")]
    pub block_hash: Option<String>,
    #[serde(rename = "transactionHash")]
    pub tx_hash: Option<String>,
    #[serde(rename = "transactionIndex")]
    pub tx_index: Option<String>,
    #[serde(rename = "logIndex")]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl TryFrom<RpcLog> for RawLog {
    type Error = TransportError;

    fn try_from(log: RpcLog) -> Result<Self, Self::Error> {
        let data_hex = log.data.strip_prefix("0x").unwrap_or(&log.data);
        let data = hex::decode(data_hex)
            .map_err(|e| TransportError::MalformedResponse(format!("log data: {e}")))?;
        Ok(RawLog {
            topics: log.topics,
            data,
            provenance: Provenance {
                address: log.address.to_ascii_lowercase(),
                block_number: parse_hex_u64("blockNumber", log.block_number.as_deref())?,
                block_hash: log.block_hash.unwrap_or_default(),
                tx_hash: log.tx_hash.unwrap_or_default(),
                tx_index: parse_hex_u32("transactionIndex", log.tx_index.as_deref())?,
                log_index: parse_hex_u32("logIndex", log.log_index.as_deref())?,
                removed: log.removed,
            },
        })
    }
}

fn parse_hex_u64(field: &str, s: Option<&str>) -> Result<u64, TransportError> {
    let s = s.ok_or_else(|| TransportError::MalformedResponse(format!("missing {field}")))?;
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16)
        .map_err(|e| TransportError::MalformedResponse(format!("{field} '{s}': {e}")))
}

fn parse_hex_u32(field: &str, s: Option<&str>) -> Result<u32, TransportError> {
    let value = parse_hex_u64(field, s)?;
    u32::try_from(value)
        .map_err(|_| TransportError::MalformedResponse(format!("{field} {value} does not fit in 32 bits")))
}

/// At most `PREVIEW_CHARS` characters of a frame, for debug logging.
fn preview(text: &str) -> &str {
    text.char_indices().nth(PREVIEW_CHARS).map_or(text, |(i, _)| &text[..i])
}

const PREVIEW_CHARS: usize = 120;

// ─── Background task plumbing ─────────────────────────────────────────────────

enum WsCommand {
    Call {
        method: &'static str,
        params: Value,
        reply: oneshot::Sender<Result<Value, TransportError>>,
    },
    Subscribe {
        params: Value,
        sink: SubscriptionSink,
        reply: oneshot::Sender<Result<String, TransportError>>,
    },
    Unsubscribe {
        subscription: String,
    },
}

struct SubscriptionSink {
    logs: mpsc::Sender<RawLog>,
    errors: oneshot::Sender<TransportError>,
}

enum Pending {
    Call(oneshot::Sender<Result<Value, TransportError>>),
    Subscribe {
        sink: SubscriptionSink,
        reply: oneshot::Sender<Result<String, TransportError>>,
    },
    /// Response nobody waits for (e.g. `eth_unsubscribe`)
    Ignore,
}

#[derive(Default)]
struct WsState {
    pending: HashMap<u64, Pending>,
    subscriptions: HashMap<String, SubscriptionSink>,
}

impl WsState {
    /// Route one text frame. Returns subscriptions that must be cancelled
    /// on the node because their consumer is gone or was failed.
    fn handle_message(&mut self, text: &str) -> Vec<String> {
        let Ok(val) = serde_json::from_str::<Value>(text) else {
            debug!("ignoring non-JSON WebSocket message");
            return vec![];
        };

        if val.get("method").and_then(Value::as_str) == Some("eth_subscription") {
            let params = &val["params"];
            let Some(sub_id) = params["subscription"].as_str() else {
                return vec![];
            };
            return self.dispatch(sub_id, params["result"].clone());
        }

        let Some(id) = val.get("id").and_then(Value::as_u64) else {
            return vec![];
        };
        let outcome = match val.get("error") {
            Some(err) => Err(TransportError::Rpc {
                code: err["code"].as_i64().unwrap_or(0),
                message: err["message"].as_str().unwrap_or_default().to_string(),
            }),
            None => Ok(val.get("result").cloned().unwrap_or(Value::Null)),
        };

        match self.pending.remove(&id) {
            Some(Pending::Call(reply)) => {
                let _ = reply.send(outcome);
                vec![]
            }
            Some(Pending::Subscribe { sink, reply }) => {
                let sub_id = outcome.and_then(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        TransportError::MalformedResponse(format!("subscription id: {v}"))
                    })
                });
                match sub_id {
                    Ok(sub_id) => {
                        self.subscriptions.insert(sub_id.clone(), sink);
                        if reply.send(Ok(sub_id.clone())).is_err() {
                            // caller gave up (timeout) before the node answered
                            self.subscriptions.remove(&sub_id);
                            return vec![sub_id];
                        }
                        vec![]
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        vec![]
                    }
                }
            }
            Some(Pending::Ignore) | None => vec![],
        }
    }

    fn dispatch(&mut self, sub_id: &str, result: Value) -> Vec<String> {
        let Some(sink) = self.subscriptions.get(sub_id) else {
            return vec![];
        };
        let raw = serde_json::from_value::<RpcLog>(result)
            .map_err(|e| TransportError::MalformedResponse(format!("log notification: {e}")))
            .and_then(RawLog::try_from);

        let failure = match raw {
            Ok(raw) => match sink.logs.try_send(raw) {
                Ok(()) => return vec![],
                Err(mpsc::error::TrySendError::Full(_)) => Some(TransportError::Subscription(format!(
                    "delivery queue full ({} entries)",
                    sink.logs.max_capacity()
                ))),
                Err(mpsc::error::TrySendError::Closed(_)) => None,
            },
            Err(e) => Some(e),
        };

        if let Some(sink) = self.subscriptions.remove(sub_id) {
            if let Some(err) = failure {
                warn!(subscription = sub_id, error = %err, "failing log subscription");
                let _ = sink.errors.send(err);
            }
        }
        vec![sub_id.to_string()]
    }

    /// Fail everything in flight; used when the socket goes away.
    fn fail_all(&mut self, err: TransportError) {
        for (_, pending) in self.pending.drain() {
            match pending {
                Pending::Call(reply) => {
                    let _ = reply.send(Err(err.clone()));
                }
                Pending::Subscribe { reply, .. } => {
                    let _ = reply.send(Err(err.clone()));
                }
                Pending::Ignore => {}
            }
        }
        for (_, sink) in self.subscriptions.drain() {
            let _ = sink.errors.send(err.clone());
        }
    }
}

// Covers every way out of the task, unwinding included, so no consumer
// mistakes a dead connection for a clean end.
impl Drop for WsState {
    fn drop(&mut self) {
        self.fail_all(TransportError::Closed);
    }
}

fn request(id: u64, method: &str, params: Value) -> Message {
    Message::Text(
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }).to_string(),
    )
}

async fn ws_task<S>(
    url: String,
    ws_stream: S,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    next_id: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin
        + Send
        + 'static,
{
    let (mut write, mut read) = ws_stream.split();
    let mut state = WsState::default();

    let failure = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let (id, msg) = match cmd {
                    None => {
                        debug!(url = %url, "transport dropped, closing WebSocket");
                        let _ = write.send(Message::Close(None)).await;
                        break None;
                    }
                    Some(WsCommand::Call { method, params, reply }) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        state.pending.insert(id, Pending::Call(reply));
                        (id, request(id, method, params))
                    }
                    Some(WsCommand::Subscribe { params, sink, reply }) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        state.pending.insert(id, Pending::Subscribe { sink, reply });
                        (id, request(id, "eth_subscribe", params))
                    }
                    Some(WsCommand::Unsubscribe { subscription }) => {
                        if state.subscriptions.remove(&subscription).is_some() {
                            debug!(subscription = %subscription, "unsubscribing");
                        }
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        state.pending.insert(id, Pending::Ignore);
                        (id, request(id, "eth_unsubscribe", json!([subscription])))
                    }
                };
                if let Err(e) = write.send(msg).await {
                    error!(url = %url, request = id, error = %e, "WebSocket send failed");
                    break Some(TransportError::ConnectionFailed { url: url.clone(), reason: e.to_string() });
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    debug!("WS message: {}", preview(&text));
                    for sub in state.handle_message(&text) {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        state.pending.insert(id, Pending::Ignore);
                        let _ = write.send(request(id, "eth_unsubscribe", json!([sub]))).await;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(url = %url, "WebSocket closed by server");
                    break Some(TransportError::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "WebSocket error");
                    break Some(TransportError::ConnectionFailed { url: url.clone(), reason: e.to_string() });
                }
            },
        }
    };

    connected.store(false, Ordering::Relaxed);
    if let Some(err) = failure {
        state.fail_all(err);
    }
    info!(url = %url, "WebSocket task ended");
}

// ─── Transport ────────────────────────────────────────────────────────────────

/// Log transport over one WebSocket connection.
pub struct EvmWsTransport {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    connected: Arc<AtomicBool>,
    timeout: Duration,
    channel_capacity: usize,
}

impl EvmWsTransport {
    /// Connect to `config.rpc_url` and start the background task.
    pub async fn connect(config: &StreamConfig) -> Result<Self, TransportError> {
        let url = config.rpc_url.clone();
        info!(url = %url, "connecting to WebSocket");
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %url, "WebSocket connected");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        tokio::spawn(ws_task(
            url.clone(),
            ws_stream,
            cmd_rx,
            Arc::new(AtomicU64::new(1)),
            Arc::clone(&connected),
        ));

        Ok(Self {
            url,
            cmd_tx,
            connected,
            timeout: config.request_timeout(),
            channel_capacity: config.channel_capacity.max(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Raw JSON-RPC call.
    pub async fn call(&self, method: &'static str, params: Value) -> Result<Value, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Call { method, params, reply })
            .map_err(|_| TransportError::Closed)?;
        self.await_reply(rx).await
    }

    async fn await_reply<T>(
        &self,
        rx: oneshot::Receiver<Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => Err(TransportError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
            Ok(Err(_)) => Err(TransportError::Closed),
            Ok(Ok(outcome)) => outcome,
        }
    }
}

#[async_trait]
impl LogTransport for EvmWsTransport {
    async fn fetch_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, TransportError> {
        let result = self.call("eth_getLogs", json!([filter.to_json(true)])).await?;
        let logs: Vec<RpcLog> = serde_json::from_value(result)
            .map_err(|e| TransportError::MalformedResponse(format!("eth_getLogs: {e}")))?;
        logs.into_iter().map(RawLog::try_from).collect()
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError> {
        let (logs_tx, logs) = mpsc::channel(self.channel_capacity);
        let (errors_tx, errors) = oneshot::channel();
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Subscribe {
                params: json!(["logs", filter.to_json(false)]),
                sink: SubscriptionSink {
                    logs: logs_tx,
                    errors: errors_tx,
                },
                reply,
            })
            .map_err(|_| TransportError::Closed)?;
        let id = self.await_reply(rx).await?;
        info!(subscription = %id, "log subscription opened");

        let cmd_tx = self.cmd_tx.clone();
        let subscription = id.clone();
        let handle = SubscriptionHandle::new(id, move || {
            let _ = cmd_tx.send(WsCommand::Unsubscribe { subscription });
        });
        Ok(LogSubscription {
            logs,
            errors,
            handle,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
