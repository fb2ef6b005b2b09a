#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shadepool_indexer::{ingest, read_event_file, rebuild, serve_rpc, EventStore};
use shadepool_state::EventProjector;

/// Indexer configuration resolved from CLI/env/defaults.
#[derive(Parser, Debug)]
#[command(name = "shadepool-indexer", version)]
struct Config {
    /// RPC listen address
    #[arg(long = "listen")]
    listen: Option<String>,
    /// Path to the event store (sled)
    #[arg(long = "db")]
    db: Option<PathBuf>,
    /// JSON-lines event file to ingest
    #[arg(long = "events")]
    events: Option<PathBuf>,
    /// Token clients must send as `auth`
    #[arg(long = "auth")]
    auth: Option<String>,
    /// Re-read the event file every N seconds
    #[arg(long = "poll-secs")]
    poll_secs: Option<u64>,
}

#[derive(Debug)]
struct ResolvedConfig {
    listen: String,
    db_path: PathBuf,
    events: Option<PathBuf>,
    auth: Option<String>,
    poll: Option<Duration>,
}

fn resolve_config(cli: Config) -> Result<ResolvedConfig> {
    let listen = cli
        .listen
        .or_else(|| env::var("SHADEPOOL_LISTEN").ok())
        .unwrap_or_else(|| "127.0.0.1:27555".to_string());
    let db_path = cli
        .db
        .or_else(|| env::var("SHADEPOOL_INDEXER_DB").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("shadepool.indexer.db"));
    let events = cli
        .events
        .or_else(|| env::var("SHADEPOOL_EVENTS").ok().map(PathBuf::from));
    let auth = cli.auth.or_else(|| env::var("SHADEPOOL_RPC_AUTH").ok());
    let poll_secs = match cli.poll_secs {
        Some(s) => Some(s),
        None => match env::var("SHADEPOOL_POLL_SECS") {
            Ok(raw) => Some(raw.parse().context("SHADEPOOL_POLL_SECS")?),
            Err(_) => None,
        },
    };
    if poll_secs == Some(0) {
        return Err(anyhow!("poll interval must be positive"));
    }
    Ok(ResolvedConfig {
        listen,
        db_path,
        events,
        auth,
        poll: poll_secs.map(Duration::from_secs),
    })
}

fn ingest_file(
    store: &EventStore,
    projector: &Mutex<EventProjector>,
    path: &std::path::Path,
) -> Result<()> {
    let events = read_event_file(path)?;
    let mut projector = projector
        .lock()
        .map_err(|_| anyhow!("projector lock poisoned"))?;
    ingest(store, &mut projector, &events)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shadepool_indexer=info,shadepool_state=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = resolve_config(Config::parse())?;
    let store = EventStore::open(&cfg.db_path)
        .with_context(|| format!("opening {}", cfg.db_path.display()))?;
    let projector = Arc::new(Mutex::new(rebuild(&store)?));

    if let Some(path) = &cfg.events {
        ingest_file(&store, &projector, path)?;
    }
    if let Ok(p) = projector.lock() {
        let stats = p.stats();
        info!(
            events = stats.events,
            entries = stats.entries,
            shielded_trees = stats.shielded_trees,
            wormhole_trees = stats.wormhole_trees,
            "projector ready"
        );
    }

    if let (Some(path), Some(interval)) = (cfg.events.clone(), cfg.poll) {
        let projector = Arc::clone(&projector);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = ingest_file(&store, &projector, &path) {
                    warn!(error = %e, "event poll failed");
                }
            }
        });
    }

    let listener = TcpListener::bind(&cfg.listen)
        .await
        .with_context(|| format!("binding {}", cfg.listen))?;
    info!(listen = %cfg.listen, auth = cfg.auth.is_some(), "rpc listening");
    serve_rpc(listener, cfg.auth, projector).await?;
    Ok(())
}
