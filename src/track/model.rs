//! Track identifiers and track views

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::point::Point;

const KEY_PREFIX: &str = "track:";
const POINTS_SUFFIX: &str = ":points";

/// Identifier of a track (e.g., "42")
///
/// The storage key and the watch room name are both `track:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TrackId(String);

impl TrackId {
    /// Create an identifier from its bare form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse either the bare form ("42") or the storage key ("track:42")
    pub fn from_key(key: &str) -> Self {
        Self::new(key.strip_prefix(KEY_PREFIX).unwrap_or(key))
    }

    /// Bare identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the header hash, also used as the catalog member and room name
    pub fn key(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.0)
    }

    /// Key of the point list
    pub fn points_key(&self) -> String {
        format!("{}{}{}", KEY_PREFIX, self.0, POINTS_SUFFIX)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", KEY_PREFIX, self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::from_key(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        match id.strip_prefix(KEY_PREFIX) {
            Some(bare) => Self::new(bare),
            None => Self(id),
        }
    }
}

impl From<TrackId> for String {
    fn from(id: TrackId) -> Self {
        id.0
    }
}

/// Scalar header fields of a track (name and friends)
pub type TrackHeader = BTreeMap<String, String>;

/// Header fields shadowed by the track's own `id` and `points`
pub const RESERVED_FIELDS: [&str; 2] = ["id", "points"];

/// A track with its header and every point appended so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    #[serde(flatten)]
    pub header: TrackHeader,
    pub points: Vec<Point>,
}

impl Track {
    /// Assemble a track from separately loaded parts
    ///
    /// Header fields named `id` or `points` are dropped; the identifier and
    /// the loaded points take their place.
    pub fn new(id: TrackId, mut header: TrackHeader, points: Vec<Point>) -> Self {
        for field in RESERVED_FIELDS {
            if header.remove(field).is_some() {
                tracing::debug!(track = %id, field = field, "Header field shadowed");
            }
        }
        Self { id, header, points }
    }

    /// Display name, if the header has one
    pub fn name(&self) -> Option<&str> {
        self.header.get("name").map(String::as_str)
    }

    /// Most recent point
    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let id = TrackId::new("42");
        assert_eq!(id.key(), "track:42");
        assert_eq!(id.points_key(), "track:42:points");
        assert_eq!(id.to_string(), "track:42");
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_from_key() {
        assert_eq!(TrackId::from_key("track:42"), TrackId::new("42"));
        assert_eq!(TrackId::from_key("42"), TrackId::new("42"));
        assert_eq!(TrackId::from("track:x"), TrackId::new("x"));
    }

    #[test]
    fn test_serde_uses_bare_form() {
        let id: TrackId = serde_json::from_str(r#""track:42""#).unwrap();
        assert_eq!(id, TrackId::new("42"));
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""42""#);
    }

    #[test]
    fn test_track_json_shape() {
        let mut header = TrackHeader::new();
        header.insert("name".into(), "Morning ride".into());
        let track = Track::new(TrackId::new("7"), header, vec![Point::new(1.0, 2.0)]);

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "7",
                "name": "Morning ride",
                "points": [{"lat": 1.0, "lon": 2.0}],
            })
        );
        assert_eq!(track.name(), Some("Morning ride"));
        assert_eq!(track.last_point(), Some(&Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_reserved_header_fields_are_shadowed() {
        let header = TrackHeader::from([
            ("id".to_string(), "99".to_string()),
            ("points".to_string(), "3".to_string()),
            ("name".to_string(), "Ride".to_string()),
        ]);
        let track = Track::new(TrackId::new("42"), header, vec![Point::new(1.0, 2.0)]);

        assert!(!track.header.contains_key("id"));
        assert!(!track.header.contains_key("points"));

        let text = serde_json::to_string(&track).unwrap();
        assert_eq!(
            text,
            r#"{"id":"42","name":"Ride","points":[{"lat":1.0,"lon":2.0}]}"#
        );

        let parsed: Track = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, track);
    }
}
