//! CLI configuration file: stream settings plus a `logging` section.
//!
//! ```yaml
//! rpc_url: wss://public-node.rsk.co/websocket
//! contract_address: "0xc2a630c053d12d63d32b025082f6ba268db18300"
//! max_block_range: 1000
//! logging:
//!   level: info
//!   components:
//!     lbcstream-stream: debug
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use lbcstream_observability::LogConfig;
use lbcstream_stream::StreamConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub channel_capacity: Option<usize>,
    pub max_block_range: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub logging: Option<LogConfig>,
}

impl CliConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("parse config file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("in '{}'", path.display()))
    }

    /// Stream settings with command-line overrides applied, validated.
    pub fn resolve_stream(
        &self,
        rpc_url: Option<&str>,
        address: Option<&str>,
    ) -> Result<StreamConfig> {
        let url = rpc_url.or(self.rpc_url.as_deref()).ok_or_else(|| {
            anyhow::anyhow!("no RPC endpoint: pass --rpc-url, set LBCSTREAM_RPC_URL, or use --config")
        })?;
        let mut config = StreamConfig::new(url);
        config.contract_address = address
            .map(str::to_string)
            .or_else(|| self.contract_address.clone());
        if let Some(capacity) = self.channel_capacity {
            config.channel_capacity = capacity;
        }
        if let Some(range) = self.max_block_range {
            config.max_block_range = range;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout_ms = ms;
        }
        config.validate().context("invalid stream configuration")?;
        Ok(config)
    }
}
