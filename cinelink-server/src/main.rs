use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cinelink_core::{NotionClient, PlexClient, SyncEngine, SyncEventBus};
use cinelink_server::{AppState, Config, Scheduler, create_router};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "cinelink-server", about = "Plex-to-Notion sync dashboard")]
struct Args {
    /// Override SERVER_HOST
    #[arg(long)]
    host: Option<String>,

    /// Override SERVER_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }
    config.ensure_directories()?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())
        .with_context(|| format!("failed to open {}", config.log_file().display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    info!("CineLink starting up");

    let config = Arc::new(config);
    let plex = PlexClient::new(&config.plex_url, &config.plex_token)?;
    let notion = NotionClient::new(&config.notion_api_key, &config.notion_database_id)?;
    let bus = Arc::new(SyncEventBus::new(
        config.event_history_capacity,
        EVENT_BROADCAST_CAPACITY,
    ));
    let engine = Arc::new(SyncEngine::new(
        Arc::new(plex),
        Arc::new(notion),
        bus,
        config.run_history_capacity,
    ));
    let scheduler = Arc::new(Scheduler::new(engine.clone()));

    let state = AppState {
        config: config.clone(),
        engine,
        scheduler,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "dashboard listening");

    axum::serve(listener, app).await?;

    Ok(())
}
