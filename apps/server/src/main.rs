//! Karabridge Server - standalone headless bridge.
//!
//! Accepts remote-control WebSocket connections and bridges each one to its
//! own session on the karaoke service.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use karabridge_core::{start_server, AppState};
use tokio::signal;
use tokio::sync::oneshot;

use crate::config::ServerConfig;

/// Grace period for bridged sessions to close their upstream side.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Karabridge Server - remote-control to karaoke-service protocol bridge.
#[derive(Parser, Debug)]
#[command(name = "karabridge-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "KARABRIDGE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "KARABRIDGE_BIND_PORT")]
    port: Option<u16>,

    /// Upstream service URL (overrides config file).
    #[arg(short = 'u', long, env = "KARABRIDGE_UPSTREAM_URL")]
    upstream_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Karabridge Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(url) = args.upstream_url {
        config.upstream_url = url;
    }

    log::info!(
        "Configuration: bind_port={}, upstream_url={}, login={}",
        config.bind_port,
        config.upstream_url,
        config.login
    );

    let app_state = AppState::new(config.to_core_config());
    let ws_manager = app_state.ws_manager.clone();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server_handle = tokio::spawn(async move {
        start_server(app_state, async move {
            let _ = shutdown_rx.await;
        })
        .await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cleaning up...");
        }
        result = &mut server_handle => {
            // The server only returns early on failure.
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("Server failed"),
                Err(e) => Err(e).context("Server task panicked"),
            };
        }
    }

    // Bridged sessions close their upstream side before the listener goes.
    let closed = ws_manager.close_all();
    log::info!("Signaled {} bridged connection(s) to close", closed);
    let _ = shutdown_tx.send(());

    if tokio::time::timeout(SHUTDOWN_GRACE, &mut server_handle)
        .await
        .is_err()
    {
        log::warn!("Server did not stop within {:?}, aborting", SHUTDOWN_GRACE);
        server_handle.abort();
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
