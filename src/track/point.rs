//! Location points and their textual encoding
//!
//! A point is stored and sent as a JSON object:
//!
//! ```text
//! {"lat":45.1,"lon":-122.6}
//! {"lat":45.1,"lon":-122.6,"time":1700000000000}
//! ```
//!
//! Keys are always written in the same order and floats use the shortest
//! representation that parses back to the same `f64`, so `decode(encode(p))`
//! returns `p` for every finite point.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single location reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Capture time in milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

impl Point {
    /// Create a point without a timestamp
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            time: None,
        }
    }

    /// Attach a capture time
    pub fn at(mut self, time_ms: i64) -> Self {
        self.time = Some(time_ms);
        self
    }

    /// Check that the coordinates describe a place on Earth
    pub fn validate(&self) -> Result<(), InvalidPoint> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(InvalidPoint::Latitude(self.lat));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(InvalidPoint::Longitude(self.lon));
        }
        Ok(())
    }
}

/// Coordinates outside the valid range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidPoint {
    Latitude(f64),
    Longitude(f64),
}

impl std::fmt::Display for InvalidPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidPoint::Latitude(v) => write!(f, "Latitude out of range: {}", v),
            InvalidPoint::Longitude(v) => write!(f, "Longitude out of range: {}", v),
        }
    }
}

impl std::error::Error for InvalidPoint {}

/// Malformed point text
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    fn new(e: serde_json::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }

    /// Parser message describing what was wrong
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Malformed point: {}", self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Encode a point to its canonical text form
///
/// Non-finite coordinates have no JSON form and come out as `null`, which
/// `decode` rejects. Validate points before storing them.
pub fn encode(point: &Point) -> String {
    let mut obj = Map::new();
    obj.insert("lat".into(), Value::from(point.lat));
    obj.insert("lon".into(), Value::from(point.lon));
    if let Some(time) = point.time {
        obj.insert("time".into(), Value::from(time));
    }
    Value::Object(obj).to_string()
}

/// Decode a point from its canonical text form
pub fn decode(text: &str) -> Result<Point, DecodeError> {
    serde_json::from_str(text).map_err(DecodeError::new)
}

/// Decode a point from an already-parsed JSON value
///
/// Used for wire payloads, which arrive inside a larger event object.
pub fn decode_value(value: Value) -> Result<Point, DecodeError> {
    serde_json::from_value(value).map_err(DecodeError::new)
}
