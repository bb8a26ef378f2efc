//! Stream configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid RPC URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid contract address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Connection and batching settings for one bridge deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket JSON-RPC endpoint, e.g. "wss://public-node.rsk.co/websocket"
    pub rpc_url: String,
    /// Bridge contract address; criteria without an address default to it
    #[serde(default)]
    pub contract_address: Option<String>,
    /// Capacity of each live subscription's delivery queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Largest block span requested by a single `eth_getLogs` call (0 = unbounded)
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_channel_capacity() -> usize { 1_024 }
fn default_max_block_range() -> u64 { 2_000 }
fn default_request_timeout_ms() -> u64 { 30_000 }

impl StreamConfig {
    /// Defaults for everything but the endpoint.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: None,
            channel_capacity: default_channel_capacity(),
            max_block_range: default_max_block_range(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn with_contract(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.rpc_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.rpc_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl {
                url: self.rpc_url.clone(),
                reason: format!("expected ws:// or wss://, got {}://", url.scheme()),
            });
        }
        if let Some(addr) = &self.contract_address {
            if !is_address(addr) {
                return Err(ConfigError::InvalidAddress(addr.clone()));
            }
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

/// `0x` followed by 40 hex digits.
pub(crate) fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_defaults() {
        let c = StreamConfig::from_yaml_str("rpc_url: wss://node.example/ws\n").unwrap();
        assert_eq!(c.channel_capacity, 1_024);
        assert_eq!(c.max_block_range, 2_000);
        assert_eq!(c.request_timeout_ms, 30_000);
        assert!(c.contract_address.is_none());
    }

    #[test]
    fn yaml_overrides() {
        let yaml = "rpc_url: ws://127.0.0.1:4445/websocket\ncontract_address: \"0xc2a630c053d12d63d32b025082f6ba268db18300\"\nmax_block_range: 500\n";
        let c = StreamConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(c.max_block_range, 500);
        assert_eq!(
            c.contract_address.as_deref(),
            Some("0xc2a630c053d12d63d32b025082f6ba268db18300")
        );
    }

    #[test]
    fn http_url_is_rejected() {
        let err = StreamConfig::new("https://node.example").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn bad_address_is_rejected() {
        let err = StreamConfig::new("wss://node.example")
            .with_contract("0x1234")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }
}
