//! EOSS — single-node HTTP object storage service. Wires the CLI, config,
//! logging, metadata driver, lock manager, and coordinator together, runs the
//! crash-recovery sweep, then serves the router until told to stop.

mod cli;
mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use eoss_api::AppState;
use eoss_common::Config;
use eoss_coordinator::ObjectCoordinator;
use eoss_lock::ObjectLockManager;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use tokio::signal;
use tracing::{error, info};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let _guards = logging::init(&config, cli.verbose);

    if let Err(e) = run(cli.command.unwrap_or(Command::Serve {
        address: "0.0.0.0".to_string(),
        port: 8080,
    }), config).await
    {
        error!(error = %e, "eoss exited with an error");
        std::process::exit(1);
    }
}

fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| std::env::var("EOSS_CONFIG").ok().map(PathBuf::from))
}

fn load_config(cli: &Cli) -> Result<Config, figment::Error> {
    let mut figment = Figment::new();
    if let Some(path) = config_path(cli) {
        figment = figment.merge(Yaml::file(path));
    }
    figment.merge(Env::prefixed("EOSS_")).extract()
}

async fn run(command: Command, config: Config) -> eoss_common::Result<()> {
    let db = eoss_db::MetadataDriver::open(&config).await?;
    eoss_db::ensure_schema(db.pool(), db.table()).await?;

    info!("running crash-recovery sweep");
    eoss_coordinator::run_sweep(&db, &config.storage_path).await?;

    match command {
        Command::Sweep => {
            info!("sweep-only run complete");
            Ok(())
        }
        Command::Serve { address, port } => serve(address, port, db, config).await,
    }
}

async fn serve(
    address: String,
    port: u16,
    db: eoss_db::MetadataDriver,
    config: Config,
) -> eoss_common::Result<()> {
    let locks = ObjectLockManager::new(config.object_lock_path.clone());
    let coordinator = ObjectCoordinator::new(db, config.storage_path.clone());
    let state = AppState::new(coordinator, locks, config);

    let app = eoss_api::build_router(state);

    let addr: SocketAddr = format!("{address}:{port}")
        .parse()
        .map_err(|e: std::net::AddrParseError| eoss_common::EossError::Config(e.to_string()))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(eoss_common::EossError::Io)?;
    info!(%addr, "eoss listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(eoss_common::EossError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
