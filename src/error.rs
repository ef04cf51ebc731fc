//! Crate-level error types

use std::io;

use crate::store::StoreError;
use crate::track::{DecodeError, TrackError};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug)]
pub enum Error {
    /// Socket I/O failure
    Io(io::Error),
    /// Wire protocol violation
    Protocol(ProtocolError),
    /// Track repository failure
    Track(TrackError),
    /// Backing store failure outside the repository (e.g., connecting)
    Store(StoreError),
    /// Malformed point payload
    Decode(DecodeError),
    /// Peer sent nothing within the idle timeout
    IdleTimeout,
    /// Peer did not authenticate within the hello timeout
    HelloTimeout,
}

/// Wire protocol errors
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A line grew past the frame limit without a terminator
    FrameTooLarge { size: usize, max: usize },
    /// A line was not a known event
    MalformedEvent(String),
    /// An outbound event could not be serialized
    Encode(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Track(e) => write!(f, "Track error: {}", e),
            Error::Store(e) => write!(f, "{}", e),
            Error::Decode(e) => write!(f, "Decode error: {}", e),
            Error::IdleTimeout => write!(f, "Connection idle timeout"),
            Error::HelloTimeout => write!(f, "No hello before timeout"),
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "Frame of {} bytes exceeds limit of {}", size, max)
            }
            ProtocolError::MalformedEvent(msg) => write!(f, "Malformed event: {}", msg),
            ProtocolError::Encode(msg) => write!(f, "Failed to encode event: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Track(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::IdleTimeout | Error::HelloTimeout => None,
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<TrackError> for Error {
    fn from(e: TrackError) -> Self {
        Error::Track(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}
