//! Track repository error types

use crate::store::StoreError;

use super::model::TrackId;
use super::point::{DecodeError, InvalidPoint};

/// Error type for track repository operations
///
/// A missing track is not an error: lookups return `Ok(None)`.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    /// Backing store unreachable, failing, or too slow
    StoreUnavailable(StoreError),
    /// A stored point failed to decode; the whole read is rejected
    CorruptTrackData {
        id: TrackId,
        index: usize,
        source: DecodeError,
    },
    /// Point coordinates out of range
    InvalidPoint(InvalidPoint),
    /// A track cannot be created without header fields
    EmptyHeader(TrackId),
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackError::StoreUnavailable(e) => write!(f, "{}", e),
            TrackError::CorruptTrackData { id, index, source } => {
                write!(f, "Corrupt point {} in {}: {}", index, id, source)
            }
            TrackError::InvalidPoint(e) => write!(f, "Invalid point: {}", e),
            TrackError::EmptyHeader(id) => write!(f, "Empty header for {}", id),
        }
    }
}

impl std::error::Error for TrackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackError::StoreUnavailable(e) => Some(e),
            TrackError::CorruptTrackData { source, .. } => Some(source),
            TrackError::InvalidPoint(e) => Some(e),
            TrackError::EmptyHeader(_) => None,
        }
    }
}

impl From<StoreError> for TrackError {
    fn from(e: StoreError) -> Self {
        TrackError::StoreUnavailable(e)
    }
}

impl From<InvalidPoint> for TrackError {
    fn from(e: InvalidPoint) -> Self {
        TrackError::InvalidPoint(e)
    }
}
