//! lbcstream CLI: inspect and follow Liquidity Bridge Contract events.
//!
//! # Commands
//! ```text
//! lbcstream kinds       [--verbose]
//! lbcstream decode-log  --topics <...> --data <hex> [--kind <Kind>]
//! lbcstream history     --kind <Kind>... [--from N] [--to N | --follow] [--where field=v1,v2]
//! lbcstream watch       --kind <Kind>... [--where field=v1,v2]
//! ```
//!
//! Extra event schemas can be added to the built-in bridge catalogue with
//! `--csdl <file>` and `--abi <file>` on any command; their kinds are
//! selected with `--schema-kind`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lbcstream_core::{
    event::DecodedEvent,
    filter::SubscriptionCriteria,
    types::NormalizedValue,
};
use lbcstream_observability::{init_tracing, LogConfig};
use lbcstream_registry::{EventRegistry, LbcEventKind, LBC_CSDL};
use std::path::PathBuf;

mod cmd_decode;
mod cmd_stream;
mod config;

use config::CliConfig;

#[derive(Parser)]
#[command(
    name = "lbcstream",
    about = "Liquidity Bridge Contract event streaming: lbcstream CLI",
    long_about = "
lbcstream CLI: list the bridge's event kinds, decode raw logs, query
historical entries and follow new ones over a WebSocket JSON-RPC node.

ENVIRONMENT VARIABLES:
  LBCSTREAM_RPC_URL    WebSocket JSON-RPC endpoint (ws:// or wss://)
  RUST_LOG             Log filter, overrides --log-level
",
    version
)]
struct Cli {
    /// YAML config file (rpc_url, contract_address, logging, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Global log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    schemas: SchemaArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Additional schemas merged into the bridge catalogue.
#[derive(Args, Default)]
struct SchemaArgs {
    /// CSDL file with extra event schemas
    #[arg(long, global = true)]
    csdl: Vec<PathBuf>,

    /// Contract ABI JSON (bare array or build artifact) with extra events
    #[arg(long, global = true)]
    abi: Vec<PathBuf>,
}

/// Connection and selection options shared by `history` and `watch`.
#[derive(Args)]
struct StreamArgs {
    /// Bridge event kind to match; repeat for several
    #[arg(
        long = "kind",
        num_args = 1..,
        value_parser = parse_lbc_kind,
        required_unless_present = "schema_kinds"
    )]
    kinds: Vec<LbcEventKind>,

    /// Event kind defined by a `--csdl` / `--abi` schema
    #[arg(long = "schema-kind", num_args = 1..)]
    schema_kinds: Vec<String>,

    /// WebSocket JSON-RPC endpoint
    #[arg(long, env = "LBCSTREAM_RPC_URL")]
    rpc_url: Option<String>,

    /// Bridge contract address
    #[arg(long)]
    address: Option<String>,

    /// Indexed-field filter `field=value[,value...]`; repeat for several fields
    #[arg(long = "where")]
    predicates: Vec<String>,

    /// Print each event as one JSON line
    #[arg(long)]
    json: bool,
}

impl StreamArgs {
    fn selected_kinds(&self) -> Vec<String> {
        self.kinds
            .iter()
            .map(|k| k.as_str().to_string())
            .chain(self.schema_kinds.iter().cloned())
            .collect()
    }
}

fn parse_lbc_kind(s: &str) -> Result<LbcEventKind, String> {
    s.parse().map_err(|_| {
        let known: Vec<&str> = LbcEventKind::ALL.iter().map(|k| k.as_str()).collect();
        format!(
            "not a bridge event kind; expected one of {} (use --schema-kind for --csdl/--abi kinds)",
            known.join(", ")
        )
    })
}

#[derive(Subcommand)]
enum Commands {
    /// List known event kinds with their signatures and fingerprints
    Kinds {
        /// Show field details
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode one event log from raw topics + data
    #[command(name = "decode-log")]
    DecodeLog {
        /// topics[0] = event fingerprint, topics[1..] = indexed fields
        #[arg(long, required = true, num_args = 1..)]
        topics: Vec<String>,
        /// Non-indexed fields (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: String,
        /// Decode as this kind instead of looking up topics[0]
        #[arg(long)]
        kind: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read past entries, optionally continuing with new ones
    History {
        #[command(flatten)]
        stream: StreamArgs,
        /// First block (default: 0)
        #[arg(long)]
        from: Option<u64>,
        /// Last block (default: latest)
        #[arg(long)]
        to: Option<u64>,
        /// Keep following new entries after the historical ones
        #[arg(long, conflicts_with = "to")]
        follow: bool,
    },

    /// Print new entries as they are emitted, until Ctrl-C
    Watch {
        #[command(flatten)]
        stream: StreamArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let mut logging = file.logging.clone().unwrap_or_else(|| LogConfig::default().with_level("warn"));
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    logging.json |= cli.log_json;
    init_tracing(&logging);

    let registry = build_registry(&cli.schemas)?;

    match cli.command {
        Commands::Kinds { verbose } => cmd_kinds(&registry, verbose),

        Commands::DecodeLog { topics, data, kind, json } => {
            cmd_decode::run(&registry, &topics, &data, kind.as_deref(), json)
        }

        Commands::History { stream, from, to, follow } => {
            let config = file.resolve_stream(stream.rpc_url.as_deref(), stream.address.as_deref())?;
            let mut criteria = build_criteria(&registry, &stream.selected_kinds(), &stream.predicates)?;
            criteria.from_block = from;
            criteria.to_block = to;
            cmd_stream::history(registry, config, &criteria, follow, stream.json).await
        }

        Commands::Watch { stream } => {
            let config = file.resolve_stream(stream.rpc_url.as_deref(), stream.address.as_deref())?;
            let criteria = build_criteria(&registry, &stream.selected_kinds(), &stream.predicates)?;
            cmd_stream::watch(registry, config, &criteria, stream.json).await
        }
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// The bridge catalogue plus any `--csdl` / `--abi` additions.
fn build_registry(schemas: &SchemaArgs) -> Result<EventRegistry> {
    let mut builder = EventRegistry::builder();
    builder.load_csdl(LBC_CSDL).context("load bridge catalogue")?;

    for path in &schemas.csdl {
        let n = builder
            .load_csdl_file(path)
            .with_context(|| format!("load CSDL file '{}'", path.display()))?;
        tracing::info!(path = %path.display(), schemas = n, "loaded CSDL schemas");
    }
    for path in &schemas.abi {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read ABI file '{}'", path.display()))?;
        let descriptors = lbcstream_evm::descriptors_from_abi_json(&json)
            .with_context(|| format!("parse ABI file '{}'", path.display()))?;
        for descriptor in descriptors {
            let kind = descriptor.kind.clone();
            builder
                .register(descriptor)
                .with_context(|| format!("register '{kind}' from '{}'", path.display()))?;
        }
    }
    Ok(builder.build())
}

/// Criteria for `kinds`, with `--where field=v1,v2` filters typed by the
/// field's declared type.
fn build_criteria(
    registry: &EventRegistry,
    kinds: &[String],
    predicates: &[String],
) -> Result<SubscriptionCriteria> {
    let mut criteria = SubscriptionCriteria {
        kinds: kinds.to_vec(),
        ..Default::default()
    };
    for predicate in predicates {
        let (field, values) = predicate
            .split_once('=')
            .with_context(|| format!("--where '{predicate}': expected field=value[,value...]"))?;
        let field = field.trim();

        let mut ty = None;
        for kind in kinds {
            if let Some(def) = registry.lookup(kind)?.field(field) {
                ty = Some(def.ty.clone());
                break;
            }
        }
        let ty = ty.with_context(|| format!("--where: no selected kind has a field '{field}'"))?;

        let values = values
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(|v| NormalizedValue::parse_typed(&ty, v))
            .collect::<Result<Vec<_>, String>>()
            .map_err(|e| anyhow::anyhow!("--where {field}: {e}"))?;
        criteria = criteria.where_indexed(field, values);
    }
    Ok(criteria)
}

fn cmd_kinds(registry: &EventRegistry, verbose: bool) -> Result<()> {
    for kind in registry.kinds() {
        let descriptor = registry.lookup(kind)?;
        println!("{:<28} {}", kind, descriptor.fingerprint);
        println!("  {}", descriptor.signature());
        if verbose {
            for (name, field) in &descriptor.fields {
                let indexed = if field.indexed { " [indexed]" } else { "" };
                println!("    - {}: {}{}", name, field.ty, indexed);
            }
        }
    }
    println!("\n{} event kinds", registry.len());
    Ok(())
}

pub(crate) fn print_event(event: &DecodedEvent, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    let p = &event.provenance;
    let removed = if p.removed { " (removed)" } else { "" };
    println!(
        "{} block={} tx={} log={}{}",
        event.kind, p.block_number, p.tx_hash, p.log_index, removed
    );
    for (name, value) in &event.fields {
        println!("  {name}: {value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbcstream_registry::lbc_registry;

    #[test]
    fn where_values_take_the_field_type() {
        let registry = lbc_registry().unwrap();
        let address = format!("0x{}", "AB".repeat(20));
        let criteria = build_criteria(
            &registry,
            &["PegOutDeposit".into()],
            &[format!("sender={address}"), format!("quoteHash=0x{}", "11".repeat(32))],
        )
        .unwrap();
        assert_eq!(criteria.predicates.len(), 2);
        assert_eq!(
            criteria.predicates[0].any_of,
            vec![NormalizedValue::Address(address.to_ascii_lowercase())]
        );
        assert_eq!(
            criteria.predicates[1].any_of,
            vec![NormalizedValue::Bytes(vec![0x11; 32])]
        );
    }

    #[test]
    fn where_accepts_several_values() {
        let registry = lbc_registry().unwrap();
        let a = format!("0x{}", "aa".repeat(20));
        let b = format!("0x{}", "bb".repeat(20));
        let criteria =
            build_criteria(&registry, &["Register".into()], &[format!("from={a},{b}")]).unwrap();
        assert_eq!(criteria.predicates[0].any_of.len(), 2);
    }

    #[test]
    fn where_rejects_unknown_field_and_bad_value() {
        let registry = lbc_registry().unwrap();
        assert!(build_criteria(&registry, &["Register".into()], &["nope=1".into()]).is_err());
        assert!(build_criteria(&registry, &["Register".into()], &["from=0x12".into()]).is_err());
        assert!(build_criteria(&registry, &["Register".into()], &["from".into()]).is_err());
    }

    #[test]
    fn extra_csdl_extends_the_catalogue() {
        let dir = std::env::temp_dir().join(format!("lbcstream-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("extra.csdl");
        std::fs::write(
            &path,
            "schema Ping:\n  event: Ping\n  fields:\n    nonce: { type: uint64 }\n",
        )
        .unwrap();
        let registry = build_registry(&SchemaArgs {
            csdl: vec![path],
            abi: vec![],
        })
        .unwrap();
        assert!(registry.contains("Ping"));
        assert!(registry.contains("Register"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn watched_kinds(args: &[&str]) -> Result<Vec<String>, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        match cli.command {
            Commands::Watch { stream } => Ok(stream.selected_kinds()),
            _ => panic!("not a watch command"),
        }
    }

    #[test]
    fn kind_flags_accept_bridge_and_schema_kinds() {
        let kinds = watched_kinds(&[
            "lbcstream", "watch", "--kind", "PegOutDeposit", "--kind", "Register", "--schema-kind", "Ping",
        ])
        .unwrap();
        assert_eq!(kinds, vec!["PegOutDeposit", "Register", "Ping"]);
        assert_eq!(
            watched_kinds(&["lbcstream", "watch", "--schema-kind", "Ping"]).unwrap(),
            vec!["Ping"]
        );
    }

    #[test]
    fn unknown_bridge_kind_fails_at_parse_time() {
        let err = watched_kinds(&["lbcstream", "watch", "--kind", "PegOutDepositt"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(watched_kinds(&["lbcstream", "watch"]).is_err());
    }

    #[test]
    fn follow_conflicts_with_an_upper_block() {
        let err = Cli::try_parse_from(["lbcstream", "history", "--kind", "Register", "--to", "5", "--follow"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(Cli::try_parse_from(["lbcstream", "history", "--kind", "Register", "--follow"]).is_ok());
    }
}
