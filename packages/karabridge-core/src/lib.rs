//! Karabridge Core - protocol bridge between a remote-control client and a
//! karaoke service.
//!
//! Every downstream WebSocket connection is paired with its own upstream
//! Socket.IO session. Messages in both directions are rewritten between the
//! two protocols, and small numeric track ids are allocated for the named
//! audio tracks the upstream service reports.
//!
//! # Architecture
//!
//! - [`context`]: per-connection session state (authentication, track ids)
//! - [`protocol`]: wire types for both peers
//! - [`translate`]: pure translators for upstream events and downstream commands
//! - [`upstream`]: upstream session traits and the Socket.IO client
//! - [`coordinator`]: the per-connection state machine
//! - [`api`]: HTTP router, bridge endpoint, and connection tracking
//! - [`state`]: configuration and protocol capability profile
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! - [`UpstreamConnector`](upstream::UpstreamConnector): opens upstream sessions
//! - [`UpstreamSession`](upstream::UpstreamSession): one live upstream session
//!
//! The standalone server uses [`SocketIoConnector`](upstream::SocketIoConnector);
//! tests provide in-memory implementations.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod protocol_constants;
pub mod state;
pub mod translate;
pub mod upstream;
pub mod utils;

// Re-export commonly used types at the crate root
pub use context::SessionContext;
pub use coordinator::{ConnectionCoordinator, ConnectionState};
pub use error::{BridgeError, BridgeResult, ErrorCode};
pub use protocol::{DownstreamEvent, InboundMessage, UpstreamCall, UpstreamEvent};
pub use state::{Config, ProtocolProfile};
pub use translate::{translate_command, translate_event, CommandError, SessionDirective, Translation};
pub use upstream::{SocketIoConnector, UpstreamConnector, UpstreamError, UpstreamSession};

// Re-export API types
pub use api::{start_server, AppState, ServerError, WsConnectionManager};
