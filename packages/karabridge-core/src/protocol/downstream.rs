//! Remote-control (downstream) message schema.
//!
//! Every frame is a JSON object `{"type": "<namespace>.<Name>", "payload": {...}}`.
//! Outgoing frames are modelled as the [`DownstreamEvent`] enum; incoming frames
//! are kept as a loosely-typed [`InboundMessage`] so that unknown types and
//! malformed payloads can be ignored instead of failing the connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Incoming
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming message envelope from the remote-control client.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Dot-namespaced message type, e.g. `remote.PlayRequest`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload; `null` when omitted.
    #[serde(default)]
    pub payload: Value,
}

impl InboundMessage {
    /// Parses a text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Recognized incoming message types.
pub mod kinds {
    pub const ADD_TO_QUEUE: &str = "remote.AddToQueueRequest";
    pub const MOVE_IN_QUEUE: &str = "remote.MoveInQueueRequest";
    pub const REMOVE_FROM_QUEUE: &str = "remote.RemoveFromQueueRequest";
    pub const PLAY: &str = "remote.PlayRequest";
    pub const PAUSE: &str = "remote.PauseRequest";
    pub const NEXT: &str = "remote.NextRequest";
    pub const TRACK_VOLUME: &str = "remote.TrackVolumeRequest";
    pub const PITCH: &str = "remote.PitchRequest";
    pub const TEMPO: &str = "remote.TempoRequest";
}

/// Song identifier as sent in `remote.AddToQueueRequest`.
#[derive(Debug, Clone, Deserialize)]
pub struct SongIdentifierRaw {
    #[serde(default)]
    pub id: Option<Value>,
}

/// Payload of `remote.AddToQueueRequest`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddToQueuePayload {
    #[serde(default)]
    pub identifier: Option<SongIdentifierRaw>,
    #[serde(default)]
    pub position: Option<Value>,
    #[serde(default)]
    pub singer: Option<String>,
}

/// Payload of `remote.MoveInQueueRequest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveInQueuePayload {
    pub queue_item_id: Value,
    #[serde(default)]
    pub from: Option<Value>,
    #[serde(default)]
    pub to: Option<Value>,
}

/// Payload of `remote.RemoveFromQueueRequest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromQueuePayload {
    pub queue_item_id: Value,
}

/// Payload of `remote.TrackVolumeRequest`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackVolumePayload {
    /// Track identifier (background or dynamically allocated).
    #[serde(rename = "type")]
    pub track: Value,
    pub volume: Value,
}

/// Payload of `remote.PitchRequest`.
#[derive(Debug, Clone, Deserialize)]
pub struct PitchPayload {
    pub pitch: Value,
}

/// Payload of `remote.TempoRequest`. Older clients send the value as `pitch`.
#[derive(Debug, Clone, Deserialize)]
pub struct TempoPayload {
    #[serde(alias = "pitch")]
    pub tempo: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outgoing
// ─────────────────────────────────────────────────────────────────────────────

/// Outgoing messages to the remote-control client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum DownstreamEvent {
    /// Sent once, before the first permissions update.
    #[serde(rename = "core.AuthenticatedEvent")]
    Authenticated {},

    #[serde(rename = "remote.PermissionsUpdateEvent")]
    PermissionsUpdate { permissions: Permissions },

    #[serde(rename = "remote.PreferencesUpdateEvent")]
    PreferencesUpdate { preferences: Preferences },

    #[serde(rename = "remote.StatusEvent")]
    Status { status: PlaybackStatus },

    #[serde(rename = "remote.QueueEvent")]
    Queue { queue: QueueSnapshot },

    /// The upstream service can no longer be reached.
    #[serde(rename = "ServerUnreachable")]
    ServerUnreachable {},

    /// The upstream session was logged out.
    #[serde(rename = "Logout")]
    Logout {},
}

impl DownstreamEvent {
    /// Returns the wire name of this event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticated {} => "core.AuthenticatedEvent",
            Self::PermissionsUpdate { .. } => "remote.PermissionsUpdateEvent",
            Self::PreferencesUpdate { .. } => "remote.PreferencesUpdateEvent",
            Self::Status { .. } => "remote.StatusEvent",
            Self::Queue { .. } => "remote.QueueEvent",
            Self::ServerUnreachable {} => "ServerUnreachable",
            Self::Logout {} => "Logout",
        }
    }

    /// Serializes the event to a text frame.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Capabilities granted to the remote-control client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub manage_queue: bool,
    pub view_queue: bool,
    pub add_to_queue: bool,
    pub manage_playback: bool,
    pub manage_volumes: bool,
    pub send_photos: bool,
}

/// Client-visible preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Whether the client should ask for a singer name when queueing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_options: Option<bool>,
}

/// Normalized playback status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    /// One of the fixed state codes in [`crate::protocol_constants`].
    pub state: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<Value>,
    pub tracks: Vec<TrackVolume>,
}

/// Volume reading for one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackVolume {
    pub track: TrackDescriptor,
    pub volume: Value,
}

/// Track identity as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDescriptor {
    #[serde(rename = "type")]
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Ordered queue contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub items: Vec<QueueItem>,
}

/// One pending song request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    /// Opaque upstream token; echoed back unchanged in move/remove requests.
    pub id: String,
    pub singer: String,
    pub song: QueueSong,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSong {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<SongIdentifier>,
    pub title: String,
    pub artist: String,
    pub song_tracks: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SongIdentifier {
    #[serde(rename = "type")]
    pub kind: u8,
    pub id: i64,
}
