//! # lbcstream-observability
//!
//! Structured logging for lbcstream binaries. Library crates only emit
//! `tracing` events; the application decides where they go by calling
//! [`init_tracing`] once at startup.
//!
//! Text output by default, JSON lines (for Loki, ELK and similar) with
//! `json: true`. Levels can be raised or lowered per crate:
//!
//! ```yaml
//! level: info
//! json: false
//! components:
//!   lbcstream-stream: debug
//! ```

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
