//! Wire types for both peers of the bridge.
//!
//! - [`downstream`]: the remote-control client's `{type, payload}` JSON schema
//! - [`upstream`]: the karaoke service's Socket.IO events and calls
//!
//! Types here only describe shapes. Mapping between the two lives in
//! [`crate::translate`].

pub mod downstream;
pub mod upstream;

pub use downstream::{
    Color, DownstreamEvent, InboundMessage, Permissions, PlaybackStatus, Preferences, QueueItem,
    QueueSnapshot, QueueSong, SongIdentifier, TrackDescriptor, TrackVolume,
};
pub use upstream::{
    AuthRequest, UpstreamCall, UpstreamEvent, UpstreamPreferences, UpstreamQueueEntry,
    UpstreamStatus,
};
