//! Bridge configuration types.
//!
//! [`Config`] is built once at process start and shared read-only by every
//! connection coordinator.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_APP_NAME, DEFAULT_BIND_PORT, DEFAULT_LOGIN, DEFAULT_UPSTREAM_URL,
};

/// Capability table describing which optional fields the upstream protocol
/// version exposes.
///
/// Older service versions send neither; a single coordinator handles all of
/// them by consulting this table instead of keeping per-version handlers.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolProfile {
    /// Queue entries carry a numeric `songId` that is forwarded to the client.
    pub queue_song_ids: bool,
    /// Status events carry an explicit `state` string. When `false`, every
    /// status is reported as idle.
    pub explicit_state: bool,
}

impl ProtocolProfile {
    /// Profile of the first service version: no song ids, no state string.
    pub const LEGACY: Self = Self {
        queue_song_ids: false,
        explicit_state: false,
    };
}

impl Default for ProtocolProfile {
    fn default() -> Self {
        Self {
            queue_song_ids: true,
            explicit_state: true,
        }
    }
}

/// Configuration for the bridge.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Upstream service endpoint (`ws://`, `wss://`, `http://` or `https://`).
    pub upstream_url: String,

    /// Login name used for the first `authenticate` call of every session.
    pub login: String,

    /// Value of the `app` field in `authenticate`.
    pub app_name: String,

    /// Consecutive login collisions tolerated before a session gives up.
    pub max_login_retries: u32,

    /// Optional-field capabilities of the upstream protocol.
    pub profile: ProtocolProfile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: DEFAULT_BIND_PORT,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            login: DEFAULT_LOGIN.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            max_login_retries: 3,
            profile: ProtocolProfile::default(),
        }
    }
}
