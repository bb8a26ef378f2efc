//! `lbcstream history` and `lbcstream watch`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lbcstream_core::filter::SubscriptionCriteria;
use lbcstream_evm::EvmCodec;
use lbcstream_registry::EventRegistry;
use lbcstream_stream::{EventStream, EvmWsTransport, StreamConfig};
use tokio::sync::mpsc;
use tracing::info;

/// How often a following `history` checks for new entries.
const FOLLOW_POLL: Duration = Duration::from_millis(250);

async fn connect(registry: EventRegistry, config: StreamConfig) -> Result<EventStream> {
    let transport = EvmWsTransport::connect(&config)
        .await
        .with_context(|| format!("connect to {}", config.rpc_url))?;
    Ok(EventStream::new(
        Arc::new(transport),
        Arc::new(registry),
        Arc::new(EvmCodec),
        config,
    ))
}

pub async fn history(
    registry: EventRegistry,
    config: StreamConfig,
    criteria: &SubscriptionCriteria,
    follow: bool,
    as_json: bool,
) -> Result<()> {
    let stream = connect(registry, config).await?;
    let mut it = stream
        .open_historical_iterator(criteria, follow)
        .await
        .context("open historical iterator")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        for event in it.by_ref() {
            crate::print_event(&event, as_json)?;
        }
        if it.is_done() {
            break;
        }
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, closing iterator");
                it.close();
                break;
            }
            _ = tokio::time::sleep(FOLLOW_POLL) => {}
        }
    }

    info!(metrics = ?stream.metrics(), "history finished");
    match it.last_error() {
        Some(err) => Err(anyhow::Error::new(err.clone()).context("historical iteration stopped")),
        None => Ok(()),
    }
}

pub async fn watch(
    registry: EventRegistry,
    config: StreamConfig,
    criteria: &SubscriptionCriteria,
    as_json: bool,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(config.channel_capacity);
    let stream = connect(registry, config).await?;
    let mut forwarder = stream
        .start_live_forwarder(criteria, tx)
        .await
        .context("start live forwarder")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => crate::print_event(&event, as_json)?,
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("interrupted, cancelling forwarder");
                forwarder.cancel();
                break;
            }
        }
    }

    let outcome = forwarder.wait().await;
    info!(metrics = ?stream.metrics(), "watch finished");
    outcome.context("live forwarder stopped")
}
