//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the remote-control client protocol and the
//! upstream karaoke service. Changing them breaks compatibility with one of
//! the two peers.

// ─────────────────────────────────────────────────────────────────────────────
// Track Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Track identifier of the single background/instrumental track.
///
/// Never allocated through the dynamic track table.
pub const BACKGROUND_TRACK_ID: u32 = 4;

/// First identifier handed out to named vocal tracks.
///
/// Identifiers below this value are reserved by the remote-control protocol.
pub const FIRST_DYNAMIC_TRACK_ID: u32 = 5;

/// Placeholder RGB colour attached to named vocal tracks.
pub const TRACK_PLACEHOLDER_COLOR: (u8, u8, u8) = (0, 0, 0);

// ─────────────────────────────────────────────────────────────────────────────
// Playback States (downstream codes)
// ─────────────────────────────────────────────────────────────────────────────

/// Nothing playing (also used for unknown upstream states).
pub const STATE_IDLE: u8 = 3;

/// A song is currently playing.
pub const STATE_PLAYING: u8 = 4;

/// Playback is paused.
pub const STATE_PAUSED: u8 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Queue Items
// ─────────────────────────────────────────────────────────────────────────────

/// Song identifier type used by the remote-control catalogue.
pub const SONG_ID_TYPE_CATALOG: u8 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Upstream Session
// ─────────────────────────────────────────────────────────────────────────────

/// Role announced in every `authenticate` call.
pub const UPSTREAM_ROLE: &str = "participant";

/// Default login name used for the first `authenticate` call.
pub const DEFAULT_LOGIN: &str = "proxy";

/// Default value of the `app` field in `authenticate`.
pub const DEFAULT_APP_NAME: &str = "karafun";

/// Default upstream service endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "wss://www.karafun.co.uk/";

/// Query parameter carrying the channel on the upstream handshake.
pub const UPSTREAM_CHANNEL_QUERY: &str = "remote";

/// Prefix prepended to the channel in [`UPSTREAM_CHANNEL_QUERY`].
pub const UPSTREAM_CHANNEL_PREFIX: &str = "kf";

/// Length of the random suffix appended to a colliding login name.
pub const LOGIN_SUFFIX_LEN: usize = 6;

// ─────────────────────────────────────────────────────────────────────────────
// Downstream Connection
// ─────────────────────────────────────────────────────────────────────────────

/// Request header carrying the channel identifier on the bridge upgrade.
pub const CHANNEL_HEADER: &str = "x-karafun-channel";

/// Default port the bridge listens on.
pub const DEFAULT_BIND_PORT: u16 = 8067;

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "karabridge";
