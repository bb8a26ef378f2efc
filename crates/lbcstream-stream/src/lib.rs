//! # lbcstream-stream
//!
//! Consumption layer for liquidity-bridge contract events.
//!
//! Both consumers share one compiled criteria set, one decode step and one
//! release protocol:
//!
//! ```text
//! SubscriptionCriteria ──compile──▶ LogFilter + EventDecoder
//!                                        │
//!                 ┌──────────────────────┴──────────────────────┐
//!                 ▼                                             ▼
//!     HistoricalIterator (pull)                      LiveForwarder (push)
//!     fetch_logs [+ subscribe_logs]                  subscribe_logs
//!     has_next / next / last_error / close           mpsc::Sender<DecodedEvent>
//! ```
//!
//! `LogTransport` abstracts the node; `EvmWsTransport` is the JSON-RPC
//! WebSocket implementation.

pub mod config;
pub mod criteria;
pub mod engine;
pub mod forwarder;
pub mod iterator;
pub mod metrics;
pub mod transport;
pub mod ws_transport;

pub use config::{ConfigError, StreamConfig};
pub use criteria::{compile, CompiledCriteria, EventDecoder};
pub use engine::EventStream;
pub use forwarder::ForwarderHandle;
pub use iterator::HistoricalIterator;
pub use metrics::StreamMetrics;
pub use transport::{LogSubscription, LogTransport, SubscriptionHandle};
pub use ws_transport::EvmWsTransport;
