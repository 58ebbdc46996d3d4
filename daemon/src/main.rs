//! modhub: web-of-trust scoring and aggregation server management.

mod config;
mod shutdown;

use anyhow::{bail, Context};
use clap::Parser;
use config::HubConfig;
use modhub_session::{
    AggregationSession, EventFilter, ModerationMode, ModerationOptions, PaginatedEventsRequest,
    ReqwestTransport, ServerState, SessionEvent, SortOrder,
};
use modhub_store::JsonFileStore;
use modhub_types::PublicKey;
use modhub_utils::{format_duration, init_logging, CancellationToken, LogFormat};
use modhub_wot::{SnapshotGraph, TrustGraphScorer};
use serde::Serialize;
use shutdown::ShutdownController;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "modhub", about = "Web-of-trust scoring and aggregation server client")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "MODHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding persisted settings.
    #[arg(long, env = "MODHUB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "MODHUB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "MODHUB_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Aggregation server used when none has been persisted yet.
    #[arg(long, env = "MODHUB_SERVER_URL")]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Compute the web of trust of a root key from a follow-graph snapshot.
    Wot {
        /// Hex public key of the root identity.
        #[arg(long)]
        root: PublicKey,
        /// JSON snapshot with `follows` and `mutes` maps.
        #[arg(long)]
        graph: PathBuf,
        /// Only print keys with at least this score.
        #[arg(long)]
        min_score: Option<i64>,
    },
    /// Check the aggregation server and follow the session until it settles.
    Health {
        /// Give up following retries after this many seconds.
        #[arg(long, default_value_t = 120)]
        wait_secs: u64,
    },
    /// Set and persist the aggregation server URL (empty disables).
    SetServer { url: String },
    /// Disable the aggregation server.
    Disable,
    /// List games known to the aggregation server.
    Games {
        #[arg(long, default_value = "popular")]
        sort: String,
        #[arg(long, default_value = "all")]
        source: String,
    },
    /// Fetch one page of events from the aggregation server.
    Events {
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<u32>,
        #[arg(long, value_delimiter = ',')]
        authors: Vec<PublicKey>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
        #[arg(long)]
        moderation: Option<ModerationMode>,
        /// Root of the web of trust the server filters by.
        #[arg(long)]
        wot_root: Option<PublicKey>,
        #[arg(long)]
        wot_threshold: Option<i64>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);

    match cli.command {
        Command::Wot {
            root,
            graph,
            min_score,
        } => run_wot(&config, root, graph, min_score).await,
        Command::Health { wait_secs } => run_health(&config, Duration::from_secs(wait_secs)).await,
        Command::SetServer { url } => {
            let session = open_session(&config).await?;
            let state = session.set_server_url(&url).await?;
            print_json(&session.status())?;
            session.shutdown();
            if state == ServerState::Retrying {
                tracing::warn!("server unreachable, it will be retried on next start");
            }
            Ok(())
        }
        Command::Disable => {
            let session = open_session(&config).await?;
            session.disable();
            print_json(&session.status())
        }
        Command::Games { sort, source } => {
            let session = active_session(&config).await?;
            let games = session.games(&sort, &source).await;
            session.shutdown();
            print_json(&games?)
        }
        Command::Events {
            kinds,
            authors,
            search,
            offset,
            limit,
            sort,
            moderation,
            wot_root,
            wot_threshold,
        } => {
            let filter = EventFilter {
                kinds,
                authors,
                search,
                ..EventFilter::default()
            };
            let mut request = PaginatedEventsRequest::new(filter)
                .with_page(offset, limit)
                .with_sort(sort);
            if moderation.is_some() || wot_root.is_some() || wot_threshold.is_some() {
                request = request.with_moderation(ModerationOptions {
                    mode: moderation.unwrap_or_default(),
                    wot_root,
                    wot_threshold,
                    ..ModerationOptions::default()
                });
            }
            let session = active_session(&config).await?;
            let page = session.fetch("cli", &request).await;
            session.shutdown();
            print_json(&page?)
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// File config (if any) with CLI and env overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<HubConfig> {
    let mut config = match &cli.config {
        Some(path) => HubConfig::from_toml_file(path)?,
        None => HubConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(url) = &cli.server_url {
        config.session.default_server_url = Some(url.clone());
    }
    Ok(config)
}

async fn open_session(config: &HubConfig) -> anyhow::Result<AggregationSession> {
    let path = config.settings_path();
    let store = JsonFileStore::open(&path)
        .with_context(|| format!("failed to open settings at {}", path.display()))?;
    let session = AggregationSession::open(
        config.session.clone(),
        Arc::new(ReqwestTransport::new()),
        Arc::new(store),
    )
    .await?;
    Ok(session)
}

async fn active_session(config: &HubConfig) -> anyhow::Result<AggregationSession> {
    let session = open_session(config).await?;
    let state = session.state();
    if state != ServerState::Active {
        session.shutdown();
        bail!("aggregation server not active (state: {state}); use relays instead");
    }
    Ok(session)
}

async fn run_wot(
    config: &HubConfig,
    root: PublicKey,
    graph: PathBuf,
    min_score: Option<i64>,
) -> anyhow::Result<()> {
    let graph = SnapshotGraph::from_file(&graph)?;
    let scorer = TrustGraphScorer::new(config.wot.clone())?;
    let cancel = ShutdownController::install();

    let table = scorer.compute_with_cancel(root, &graph, &cancel).await?;
    match min_score {
        Some(min) => {
            let trusted: Vec<_> = table
                .iter()
                .filter(|(_, score)| *score >= min)
                .map(|(key, score)| TrustedKey { pubkey: *key, score })
                .collect();
            print_json(&trusted)
        }
        None => print_json(&table),
    }
}

#[derive(Serialize)]
struct TrustedKey {
    pubkey: PublicKey,
    score: i64,
}

/// Open the session and report state changes until it is active, has
/// given up, or `wait` elapses.
async fn run_health(config: &HubConfig, wait: Duration) -> anyhow::Result<()> {
    let cancel = ShutdownController::install();
    let session = open_session(config).await?;
    let mut events = session.subscribe();

    if session.state() == ServerState::Inactive {
        session.check_health().await;
    }
    if session.state() == ServerState::Retrying {
        tracing::info!(wait = %format_duration(wait), "following retries");
        let followed = tokio::time::timeout(wait, follow_retries(&mut events, &cancel)).await;
        if followed.is_err() {
            tracing::warn!("still retrying, giving up waiting");
        }
    }

    session.shutdown();
    print_json(&session.status())
}

async fn follow_retries(
    events: &mut broadcast::Receiver<SessionEvent>,
    cancel: &CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => event,
        };
        match event {
            Ok(SessionEvent::Retry(attempt)) if attempt > 0 => {
                tracing::info!(attempt, "retrying aggregation server");
            }
            Ok(SessionEvent::Retry(_)) => {}
            Ok(SessionEvent::StateChange(state)) => {
                tracing::info!(%state, "aggregation session state");
                if matches!(state, ServerState::Active | ServerState::Inactive | ServerState::Disabled) {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "missed session events");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
