//! calliope-api - library catalogue REST service
//!
//! `calliope-api serve` runs the HTTP API; `calliope-api seed` loads a small
//! demo catalogue into the database and exits.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use calliope_common::auth::load_token_secret;
use calliope_common::config::{resolve_root_folder, RootFolder, ServiceConfig, ROOT_FOLDER_ENV};
use calliope_common::db::init_database;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calliope_api::seed::seed_catalogue;
use calliope_api::storage::UploadStorage;
use calliope_api::{build_router, AppState};

/// Command-line arguments for calliope-api
#[derive(Parser, Debug)]
#[command(name = "calliope-api")]
#[command(about = "Library catalogue REST service")]
#[command(version)]
struct Args {
    /// Folder holding calliope.db, calliope.toml and uploads/
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Interface to bind, overrides calliope.toml
        #[arg(long, env = "CALLIOPE_HOST")]
        host: Option<String>,

        /// Port to listen on, overrides calliope.toml
        #[arg(short, long, env = "CALLIOPE_PORT")]
        port: Option<u16>,
    },
    /// Load the demo catalogue into an empty database
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calliope_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting calliope-api v{} [{}] built {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let args = Args::parse();

    let root = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
    ));
    root.ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", root.path().display());

    let mut config = ServiceConfig::load(&root.service_config_path())
        .context("Failed to load service configuration")?;

    let db_path = root.database_path();
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("Database: {}", db_path.display());
            pool
        }
        Err(e) => {
            error!("Failed to open database {}: {}", db_path.display(), e);
            return Err(e.into());
        }
    };

    let storage = UploadStorage::new(root.uploads_dir());

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Seed => {
            let created = seed_catalogue(&pool, &storage, config.max_upload_bytes)
                .await
                .context("Failed to seed catalogue")?;
            info!("Seed complete: {} books added", created);
            Ok(())
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let token_secret = load_token_secret(&pool)
                .await
                .context("Failed to load token secret")?;

            let addr: SocketAddr = format!("{}:{}", config.host, config.port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

            let state = AppState::new(pool, storage, token_secret, config);
            let app = build_router(state);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;
            info!("calliope-api listening on http://{}", addr);
            info!("Health check: http://{}/health", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;

            info!("Server shutdown complete");
            Ok(())
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
