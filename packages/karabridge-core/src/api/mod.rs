//! HTTP/WebSocket API layer.
//!
//! Thin handlers around the [`ConnectionCoordinator`](crate::coordinator::ConnectionCoordinator):
//! router construction, the bridge upgrade endpoint, and server startup.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::state::Config;
use crate::upstream::{SocketIoConnector, UpstreamConnector};

pub mod http;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Bridge configuration, fixed for the lifetime of the process.
    pub config: Arc<Config>,
    /// Opens one upstream session per bridge connection.
    pub connector: Arc<dyn UpstreamConnector>,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
}

impl AppState {
    /// Creates state that connects to the configured upstream endpoint.
    pub fn new(config: Config) -> Self {
        let connector = Arc::new(SocketIoConnector::new(config.upstream_url.clone()));
        Self::with_connector(config, connector)
    }

    /// Creates state with a custom upstream connector.
    pub fn with_connector(config: Config, connector: Arc<dyn UpstreamConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            ws_manager: Arc::new(WsConnectionManager::new()),
        }
    }
}

/// Starts the HTTP server on the configured port and serves until `shutdown`
/// resolves.
///
/// A preferred port of 0 lets the OS pick one.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.preferred_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}
