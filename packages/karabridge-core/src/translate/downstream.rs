//! Downstream command translation.
//!
//! Numeric fields arrive untrusted. Anything that doesn't coerce cleanly to an
//! integer rejects the whole command; nothing is guessed.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::context::SessionContext;
use crate::protocol::downstream::{
    kinds, AddToQueuePayload, MoveInQueuePayload, PitchPayload, RemoveFromQueuePayload,
    TempoPayload, TrackVolumePayload,
};
use crate::protocol::{InboundMessage, UpstreamCall};
use crate::protocol_constants::BACKGROUND_TRACK_ID;
use crate::utils::coerce_integer;

/// Reasons a downstream command produces no upstream call.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    /// The message type is not one the bridge handles.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// The payload doesn't have the expected shape.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },

    /// A numeric field is missing or not a number.
    #[error("{kind}: field {field:?} is not an integer (got {value})")]
    InvalidNumber {
        kind: &'static str,
        field: &'static str,
        value: Value,
    },

    /// The track id doesn't name the background track or any known vocal track.
    #[error("no track with id {0}")]
    UnknownTrack(i64),
}

/// Translates one downstream command into the matching upstream call.
pub fn translate_command(
    ctx: &SessionContext,
    message: InboundMessage,
) -> Result<UpstreamCall, CommandError> {
    let InboundMessage { kind, payload } = message;
    match kind.as_str() {
        kinds::ADD_TO_QUEUE => {
            let p: AddToQueuePayload = decode(kinds::ADD_TO_QUEUE, payload)?;
            let song_id = p
                .identifier
                .and_then(|identifier| identifier.id)
                .unwrap_or(Value::Null);
            Ok(UpstreamCall::QueueAdd {
                song_id: integer(kinds::ADD_TO_QUEUE, "identifier.id", &song_id)?,
                position: integer(
                    kinds::ADD_TO_QUEUE,
                    "position",
                    p.position.as_ref().unwrap_or(&Value::Null),
                )?,
                singer: p.singer.unwrap_or_default(),
            })
        }
        kinds::MOVE_IN_QUEUE => {
            let p: MoveInQueuePayload = decode(kinds::MOVE_IN_QUEUE, payload)?;
            let to = integer(
                kinds::MOVE_IN_QUEUE,
                "to",
                p.to.as_ref().unwrap_or(&Value::Null),
            )?;
            let from = p.from.unwrap_or_else(|| p.queue_item_id.clone());
            Ok(UpstreamCall::QueueMove {
                queue_id: p.queue_item_id,
                from,
                to,
            })
        }
        kinds::REMOVE_FROM_QUEUE => {
            let p: RemoveFromQueuePayload = decode(kinds::REMOVE_FROM_QUEUE, payload)?;
            Ok(UpstreamCall::QueueRemove {
                queue_id: p.queue_item_id,
            })
        }
        kinds::PLAY => Ok(UpstreamCall::Play),
        kinds::PAUSE => Ok(UpstreamCall::Pause),
        kinds::NEXT => Ok(UpstreamCall::Next),
        kinds::TRACK_VOLUME => {
            let p: TrackVolumePayload = decode(kinds::TRACK_VOLUME, payload)?;
            let track = integer(kinds::TRACK_VOLUME, "type", &p.track)?;
            if track == i64::from(BACKGROUND_TRACK_ID) {
                return Ok(UpstreamCall::VolumeBv(p.volume));
            }
            let name = u32::try_from(track)
                .ok()
                .and_then(|id| ctx.lookup_track_name(id))
                .ok_or(CommandError::UnknownTrack(track))?;
            Ok(UpstreamCall::VolumeLd {
                name: name.to_string(),
                volume: p.volume,
            })
        }
        kinds::PITCH => {
            let p: PitchPayload = decode(kinds::PITCH, payload)?;
            Ok(UpstreamCall::Pitch(p.pitch))
        }
        kinds::TEMPO => {
            let p: TempoPayload = decode(kinds::TEMPO, payload)?;
            Ok(UpstreamCall::Tempo(p.tempo))
        }
        _ => Err(CommandError::UnknownType(kind)),
    }
}

fn decode<T: DeserializeOwned>(kind: &'static str, payload: Value) -> Result<T, CommandError> {
    serde_json::from_value(payload).map_err(|e| CommandError::MalformedPayload {
        kind,
        reason: e.to_string(),
    })
}

fn integer(kind: &'static str, field: &'static str, value: &Value) -> Result<i64, CommandError> {
    coerce_integer(value).ok_or_else(|| CommandError::InvalidNumber {
        kind,
        field,
        value: value.clone(),
    })
}
