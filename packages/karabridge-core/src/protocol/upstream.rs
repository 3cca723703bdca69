//! Karaoke service (upstream) event and call schema.
//!
//! The upstream session speaks Socket.IO: every event is a name plus a list of
//! JSON arguments. [`UpstreamEvent::from_socket_event`] turns a received event
//! into a typed value, and [`UpstreamCall`] knows how to render itself back into
//! an event name and argument list.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::protocol_constants::UPSTREAM_ROLE;

// ─────────────────────────────────────────────────────────────────────────────
// Events (upstream -> bridge)
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted by the upstream session.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Capability names granted to this login.
    Permissions(Vec<String>),
    Preferences(UpstreamPreferences),
    Status(UpstreamStatus),
    /// Queue snapshot, in playback order.
    Queue(Vec<UpstreamQueueEntry>),
    ServerUnreachable,
    Logout,
    /// The login name used in `authenticate` is already in use on the channel.
    LoginAlreadyTaken,
}

impl UpstreamEvent {
    /// Builds a typed event from a Socket.IO event name and its arguments.
    ///
    /// Returns `None` for unknown event names and for known names whose
    /// arguments don't have the expected shape.
    pub fn from_socket_event(name: &str, args: &[Value]) -> Option<Self> {
        let first = args.first().cloned().unwrap_or(Value::Null);
        let parsed = match name {
            "permissions" => serde_json::from_value(first).map(Self::Permissions),
            "preferences" => serde_json::from_value(first).map(Self::Preferences),
            "status" => serde_json::from_value(first).map(Self::Status),
            "queue" => serde_json::from_value(first).map(Self::Queue),
            // The service spells this event both ways across versions.
            "serverUnreachable" | "serverUnreacheable" => Ok(Self::ServerUnreachable),
            "logout" => Ok(Self::Logout),
            "loginAlreadyTaken" => Ok(Self::LoginAlreadyTaken),
            _ => {
                log::debug!("[Upstream] Ignoring unknown event {:?}", name);
                return None;
            }
        };

        match parsed {
            Ok(event) => Some(event),
            Err(e) => {
                log::warn!("[Upstream] Ignoring malformed {:?} event: {}", name, e);
                None
            }
        }
    }

    /// Returns the upstream event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Permissions(_) => "permissions",
            Self::Preferences(_) => "preferences",
            Self::Status(_) => "status",
            Self::Queue(_) => "queue",
            Self::ServerUnreachable => "serverUnreachable",
            Self::Logout => "logout",
            Self::LoginAlreadyTaken => "loginAlreadyTaken",
        }
    }
}

/// Upstream preferences. Only the fields the bridge maps are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPreferences {
    #[serde(default)]
    pub ask_singer_name: Option<bool>,
}

/// Upstream playback status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStatus {
    /// `"playing"`, `"paused"`, or anything else.
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub tempo: Option<Value>,
    #[serde(default)]
    pub pitch: Option<Value>,
    /// Background (instrumental) volume.
    #[serde(default)]
    pub volume_bv: Option<Value>,
    /// Named vocal track volumes, keyed by track name.
    #[serde(default)]
    pub volume_ld: Option<Map<String, Value>>,
}

/// One entry of an upstream queue snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamQueueEntry {
    pub id: Value,
    #[serde(default)]
    pub singer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song_id: Option<Value>,
}

impl UpstreamQueueEntry {
    /// Returns the entry id as an opaque string token.
    pub fn id_token(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calls (bridge -> upstream)
// ─────────────────────────────────────────────────────────────────────────────

/// Arguments of the `authenticate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    pub login: String,
    pub channel: String,
    pub role: String,
    pub app: String,
    /// Always `null`; the service assigns the socket id itself.
    pub socket_id: Option<String>,
}

impl AuthRequest {
    /// Creates a participant authentication request.
    pub fn participant(
        login: impl Into<String>,
        channel: impl Into<String>,
        app: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            channel: channel.into(),
            role: UPSTREAM_ROLE.to_string(),
            app: app.into(),
            socket_id: None,
        }
    }
}

/// Calls the bridge issues on the upstream session.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCall {
    Authenticate(AuthRequest),
    QueueAdd {
        song_id: i64,
        position: i64,
        singer: String,
    },
    QueueMove {
        queue_id: Value,
        from: Value,
        to: i64,
    },
    QueueRemove {
        queue_id: Value,
    },
    Play,
    Pause,
    Next,
    /// Background track volume.
    VolumeBv(Value),
    /// Named vocal track volume.
    VolumeLd {
        name: String,
        volume: Value,
    },
    Pitch(Value),
    Tempo(Value),
}

impl UpstreamCall {
    /// Socket.IO event name of this call.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::QueueAdd { .. } => "queueAdd",
            Self::QueueMove { .. } => "queueMove",
            Self::QueueRemove { .. } => "queueRemove",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Next => "next",
            Self::VolumeBv(_) => "volumeBv",
            Self::VolumeLd { .. } => "volumeLd",
            Self::Pitch(_) => "pitch",
            Self::Tempo(_) => "tempo",
        }
    }

    /// Socket.IO arguments of this call.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Authenticate(auth) => {
                vec![serde_json::to_value(auth).unwrap_or(Value::Null)]
            }
            Self::QueueAdd {
                song_id,
                position,
                singer,
            } => vec![json!({
                "songId": song_id,
                "position": position,
                "singer": singer,
            })],
            Self::QueueMove { queue_id, from, to } => vec![json!({
                "queueId": queue_id,
                "from": from,
                "to": to,
            })],
            Self::QueueRemove { queue_id } => vec![json!({ "queueId": queue_id })],
            Self::Play | Self::Pause | Self::Next => vec![],
            Self::VolumeBv(volume) => vec![volume.clone()],
            Self::VolumeLd { name, volume } => {
                let mut map = Map::new();
                map.insert(name.clone(), volume.clone());
                vec![Value::Object(map)]
            }
            Self::Pitch(value) | Self::Tempo(value) => vec![value.clone()],
        }
    }
}
