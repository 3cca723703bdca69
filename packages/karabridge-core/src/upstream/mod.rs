//! Upstream session abstraction and the Socket.IO implementation.
//!
//! The coordinator only sees the [`UpstreamConnector`] and [`UpstreamSession`]
//! traits. The production implementation ([`SocketIoConnector`]) speaks
//! Engine.IO v4 over a WebSocket; tests substitute in-memory sessions.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{UpstreamCall, UpstreamEvent};

mod client;
pub mod engine_io;
pub mod login;

pub use client::{upstream_url_for_channel, SocketIoConnector};
pub use login::randomized_login;

/// Errors raised by the upstream session transport.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The configured endpoint is not a usable URL.
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    /// WebSocket connect or I/O failure.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// The peer sent something that isn't valid Engine.IO / Socket.IO.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session has already been closed.
    #[error("upstream session closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for UpstreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Result alias for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// One live session with the upstream service.
///
/// Implementations must make [`next_event`](Self::next_event) cancel-safe,
/// since the coordinator polls it inside `tokio::select!`.
#[async_trait]
pub trait UpstreamSession: Send {
    /// Sends a call to the upstream service.
    async fn emit(&mut self, call: UpstreamCall) -> UpstreamResult<()>;

    /// Waits for the next upstream event.
    ///
    /// Returns `None` once the transport has ended.
    async fn next_event(&mut self) -> Option<UpstreamEvent>;

    /// Closes the session. Calling this more than once is a no-op.
    async fn close(&mut self);
}

/// Opens upstream sessions, one per downstream connection.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Connects to the upstream service for the given channel.
    async fn connect(&self, channel: &str) -> UpstreamResult<Box<dyn UpstreamSession>>;
}
