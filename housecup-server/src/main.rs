//! House Cup Server
//!
//! Records house point events, serves windowed totals and streams live
//! updates over WebSocket.

mod api;
mod config;
mod seed;
mod server;
mod shutdown;
mod state;

use clap::{Parser, ValueEnum};
use config::ConfigLoader;
use housecup_core::config::ConfigStore;
use housecup_core::store::EventStore;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// House Cup - real-time points ingestion and windowed aggregation
#[derive(Parser, Debug)]
#[command(name = "housecup-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./housecup.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:8000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the database URL (e.g., sqlite://housecup.db)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Insert sample events before serving
    #[arg(long, default_value = "false")]
    populate_test_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.log_format);

    tracing::info!("Starting housecup-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(
        &args.config,
        args.listen,
        args.database_url.clone(),
    ));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Open the event store (runs migrations)
    tracing::info!("Opening event store...");
    let store = EventStore::open(&loaded_config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to open event store: {}", e);
            e
        })?;

    if args.populate_test_data {
        seed::populate_test_data(&store).await.map_err(|e| {
            tracing::error!("Failed to populate test data: {}", e);
            e
        })?;
    }

    // Create application state
    let stream_config = ConfigStore::new(loaded_config.stream);
    let (state, update_rx) = AppState::new(
        store.clone(),
        stream_config,
        loaded_config.subscriber_buffer,
    );

    // Start the hub pump
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let hub_task = tokio::spawn(state.hub.clone().run(update_rx, shutdown_rx));

    if loaded_config.autostart {
        state.producer().start().await;
    }

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state.clone(), &loaded_config.allowed_origins);

    // Run the server
    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen, shutdown_tx.clone()).await;

    // Stop background work
    reload_notify.notify_one();
    state.producer().shutdown().await;
    let _ = shutdown_tx.send(true);
    if let Err(e) = hub_task.await {
        tracing::error!("Hub task ended abnormally: {}", e);
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    store.pool().close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
