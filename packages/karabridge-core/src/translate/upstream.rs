//! Upstream event translation.

use crate::context::SessionContext;
use crate::protocol::{
    Color, DownstreamEvent, Permissions, PlaybackStatus, Preferences, QueueItem, QueueSnapshot,
    QueueSong, SongIdentifier, TrackDescriptor, TrackVolume, UpstreamEvent, UpstreamPreferences,
    UpstreamQueueEntry, UpstreamStatus,
};
use crate::protocol_constants::{
    BACKGROUND_TRACK_ID, SONG_ID_TYPE_CATALOG, STATE_IDLE, STATE_PAUSED, STATE_PLAYING,
    TRACK_PLACEHOLDER_COLOR,
};
use crate::state::ProtocolProfile;
use crate::utils::coerce_integer;

/// Follow-up the coordinator must perform on the upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDirective {
    /// Issue `authenticate` again with a fresh login name.
    Reauthenticate,
    /// Close the upstream session once the messages are delivered.
    Terminate,
}

/// Result of translating one upstream event.
#[derive(Debug, Default, PartialEq)]
pub struct Translation {
    /// Messages to send downstream, in order.
    pub messages: Vec<DownstreamEvent>,
    pub directive: Option<SessionDirective>,
}

impl Translation {
    fn send(messages: Vec<DownstreamEvent>) -> Self {
        Self {
            messages,
            directive: None,
        }
    }
}

/// Translates a single upstream event into downstream messages.
pub fn translate_event(
    ctx: &mut SessionContext,
    profile: &ProtocolProfile,
    event: UpstreamEvent,
) -> Translation {
    match event {
        UpstreamEvent::Permissions(granted) => {
            let mut messages = Vec::with_capacity(2);
            if ctx.mark_authenticated() {
                messages.push(DownstreamEvent::Authenticated {});
            }
            messages.push(DownstreamEvent::PermissionsUpdate {
                permissions: map_permissions(&granted),
            });
            Translation::send(messages)
        }
        UpstreamEvent::Preferences(prefs) => Translation::send(vec![map_preferences(&prefs)]),
        UpstreamEvent::Status(status) => Translation::send(vec![map_status(ctx, profile, status)]),
        UpstreamEvent::Queue(entries) => Translation::send(vec![map_queue(profile, &entries)]),
        UpstreamEvent::ServerUnreachable => Translation {
            messages: vec![DownstreamEvent::ServerUnreachable {}],
            directive: Some(SessionDirective::Terminate),
        },
        UpstreamEvent::Logout => Translation {
            messages: vec![DownstreamEvent::Logout {}],
            directive: Some(SessionDirective::Terminate),
        },
        UpstreamEvent::LoginAlreadyTaken => Translation {
            messages: Vec::new(),
            directive: Some(SessionDirective::Reauthenticate),
        },
    }
}

/// Upstream capability name -> downstream permission flag.
fn map_permissions(granted: &[String]) -> Permissions {
    let has = |name: &str| granted.iter().any(|g| g == name);
    Permissions {
        manage_queue: has("manageQueue"),
        view_queue: has("viewQueue"),
        add_to_queue: has("addToQueue"),
        manage_playback: has("manageKaraoke"),
        manage_volumes: has("managePlayer"),
        send_photos: has("uploadPicture"),
    }
}

// TODO: map generalVolume and micVolume once the client exposes matching toggles.
fn map_preferences(prefs: &UpstreamPreferences) -> DownstreamEvent {
    DownstreamEvent::PreferencesUpdate {
        preferences: Preferences {
            ask_options: prefs.ask_singer_name,
        },
    }
}

/// Normalizes the upstream playback state to one of the fixed downstream codes.
pub fn normalize_state(state: Option<&serde_json::Value>) -> u8 {
    match state.and_then(|s| s.as_str()) {
        Some("playing") => STATE_PLAYING,
        Some("paused") => STATE_PAUSED,
        _ => STATE_IDLE,
    }
}

fn map_status(
    ctx: &mut SessionContext,
    profile: &ProtocolProfile,
    status: UpstreamStatus,
) -> DownstreamEvent {
    let named = status.volume_ld.unwrap_or_default();

    // Eviction must precede allocation so a freed id is reusable in this cycle.
    ctx.prune_track_ids(named.keys().map(String::as_str));

    let mut tracks = Vec::with_capacity(named.len() + 1);
    if let Some(volume) = status.volume_bv {
        tracks.push(TrackVolume {
            track: TrackDescriptor {
                id: BACKGROUND_TRACK_ID,
                caption: None,
                color: None,
            },
            volume,
        });
    }

    let (red, green, blue) = TRACK_PLACEHOLDER_COLOR;
    for (name, volume) in named {
        let id = ctx.resolve_or_assign_track_id(&name);
        tracks.push(TrackVolume {
            track: TrackDescriptor {
                id,
                caption: Some(name),
                color: Some(Color { red, green, blue }),
            },
            volume,
        });
    }

    let state = if profile.explicit_state {
        normalize_state(status.state.as_ref())
    } else {
        STATE_IDLE
    };

    DownstreamEvent::Status {
        status: PlaybackStatus {
            state,
            tempo: status.tempo,
            pitch: status.pitch,
            tracks,
        },
    }
}

fn map_queue(profile: &ProtocolProfile, entries: &[UpstreamQueueEntry]) -> DownstreamEvent {
    let items = entries
        .iter()
        .map(|entry| QueueItem {
            id: entry.id_token(),
            singer: entry.singer.clone().unwrap_or_default(),
            song: QueueSong {
                id: if profile.queue_song_ids {
                    entry
                        .song_id
                        .as_ref()
                        .and_then(coerce_integer)
                        .map(|id| SongIdentifier {
                            kind: SONG_ID_TYPE_CATALOG,
                            id,
                        })
                } else {
                    None
                },
                title: entry.title.clone().unwrap_or_default(),
                artist: entry.artist.clone().unwrap_or_default(),
                song_tracks: Vec::new(),
            },
        })
        .collect();

    DownstreamEvent::Queue {
        queue: QueueSnapshot { items },
    }
}
