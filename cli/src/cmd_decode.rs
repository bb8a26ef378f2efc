//! `lbcstream decode-log`: decode one raw log against the catalogue.

use anyhow::{anyhow, Context, Result};
use lbcstream_core::{
    codec::ValueCodec,
    event::{Provenance, RawLog},
};
use lbcstream_evm::EvmCodec;
use lbcstream_registry::EventRegistry;

pub fn run(
    registry: &EventRegistry,
    topics: &[String],
    data: &str,
    kind: Option<&str>,
    as_json: bool,
) -> Result<()> {
    let data = hex::decode(data.strip_prefix("0x").unwrap_or(data)).context("invalid data hex")?;
    let raw = RawLog {
        topics: topics.to_vec(),
        data,
        provenance: Provenance::default(),
    };

    let descriptor = match kind {
        Some(kind) => registry.lookup(kind)?,
        None => {
            let topic0 = raw.event_signature().context("no topics given")?;
            registry
                .by_fingerprint(topic0)
                .ok_or_else(|| anyhow!("no event kind registered for fingerprint {topic0}"))?
        }
    };

    let event = EvmCodec
        .decode_log(descriptor, &raw)
        .with_context(|| format!("decode as {}", descriptor.kind))?;
    crate::print_event(&event, as_json)
}
