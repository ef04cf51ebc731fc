//! Wire events
//!
//! Each event is one JSON object per line, tagged by name:
//!
//! ```text
//! {"event":"hello","data":{"token":"s3cret"}}
//! {"event":"watch track","data":{"trackid":"42"}}
//! {"event":"new point","data":{"lat":10.0,"lon":20.0}}
//! {"event":"list tracks"}
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::track::{Point, Track, TrackId};

/// Events sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Present credentials; must come first
    #[serde(rename = "hello")]
    Hello {
        #[serde(default)]
        token: Option<String>,
    },

    /// Join the room of a track
    #[serde(rename = "watch track")]
    WatchTrack { trackid: TrackId },

    /// Leave the room of a track
    #[serde(rename = "unwatch track")]
    UnwatchTrack { trackid: TrackId },

    /// Report a point for the watched track
    ///
    /// The payload is kept raw and decoded by the point codec, so a bad
    /// point does not make the whole line unparseable.
    #[serde(rename = "new point")]
    NewPoint(Value),

    /// Request a snapshot of one track
    #[serde(rename = "get track")]
    GetTrack { trackid: TrackId },

    /// Request every listed track
    #[serde(rename = "list tracks")]
    ListTracks,
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Authentication accepted
    #[serde(rename = "welcome")]
    Welcome { principal: String, connection: u64 },

    /// Room joined
    #[serde(rename = "watching")]
    Watching { trackid: TrackId },

    /// A point reported by another watcher of the same track
    #[serde(rename = "new point")]
    NewPoint(Point),

    /// Snapshot of one track
    #[serde(rename = "track")]
    Track(Track),

    /// Every listed track
    #[serde(rename = "tracks")]
    Tracks(Vec<Track>),

    /// Requested track does not exist
    #[serde(rename = "not found")]
    NotFound { trackid: TrackId },

    /// Request failed
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    /// Build an error event
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Serialize to a newline-terminated frame
    ///
    /// The frame is reference counted, so one encoding can be handed to any
    /// number of connections.
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(64).writer();
        serde_json::to_writer(&mut buf, self).map_err(|e| ProtocolError::Encode(e.to_string()))?;

        let mut buf = buf.into_inner();
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }

    /// Parse a frame produced by [`ServerEvent::to_frame`]
    pub fn from_frame(frame: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(frame).map_err(|e| ProtocolError::MalformedEvent(e.to_string()))
    }
}

impl ClientEvent {
    /// Parse one line
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(line).map_err(|e| ProtocolError::MalformedEvent(e.to_string()))
    }

    /// Serialize to a newline-terminated frame
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        let mut line =
            serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }

    /// Event name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Hello { .. } => "hello",
            ClientEvent::WatchTrack { .. } => "watch track",
            ClientEvent::UnwatchTrack { .. } => "unwatch track",
            ClientEvent::NewPoint(_) => "new point",
            ClientEvent::GetTrack { .. } => "get track",
            ClientEvent::ListTracks => "list tracks",
        }
    }
}
