//! catalog-svc - Product catalog microservice
//!
//! Serves category/product CRUD over HTTP and ingests batch CSV/JSON files
//! through in-process upload queues.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_common::config::{ensure_root_folder, TomlConfig};
use catalog_common::events::EventBus;
use catalog_svc::config::{CliOverrides, ServiceConfig};
use catalog_svc::queue::{default_dispatcher, spawn_consumers, MessageQueue};
use catalog_svc::AppState;

/// Command-line arguments for catalog-svc
#[derive(Parser, Debug)]
#[command(name = "catalog-svc")]
#[command(about = "Product catalog microservice")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "CATALOG_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "CATALOG_BIND")]
    bind: Option<String>,

    /// Root folder holding the catalog database
    #[arg(short, long, env = "CATALOG_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_svc=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting catalog-svc (Product Catalog) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let toml_config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration file")?;
    let config = ServiceConfig::resolve(
        &CliOverrides {
            port: args.port,
            bind: args.bind,
            root_folder: args.root_folder,
        },
        &toml_config,
    );

    let db_path = ensure_root_folder(&config.root_folder)
        .context("Failed to initialize root folder")?;
    info!("Database: {}", db_path.display());

    let db_pool = catalog_svc::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let event_bus = EventBus::new(config.event_capacity);
    info!(capacity = event_bus.capacity(), "Event bus initialized");
    let (queue, receivers) = MessageQueue::new(config.queue_capacity);
    let state = AppState::new(db_pool, event_bus, queue, config.max_lock_wait_ms);

    // Consumers must run before re-dispatch so a full queue cannot block startup
    let consumers = spawn_consumers(state.clone(), default_dispatcher(), receivers);
    info!(queues = consumers.len(), "Queue consumers started");

    let resumed = state
        .uploads()
        .resume_unfinished()
        .await
        .context("Failed to resume unfinished uploads")?;
    info!(resumed, "Upload recovery complete");

    let app = catalog_svc::build_router(state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
