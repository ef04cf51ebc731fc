//! Connection handles
//!
//! The registry never owns a connection's transport. It holds a handle: the
//! connection's identity plus the sending half of its outbound queue. The
//! connection task drains the queue onto the socket.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Unique identifier of a connection
pub type ConnectionId = u64;

/// Why a frame could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection is not draining its queue fast enough
    QueueFull,
    /// The connection has gone away
    Closed,
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::QueueFull => write!(f, "outbound queue full"),
            DeliveryError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Identity and send capability of one connection
///
/// Two handles are equal when they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
}

impl ConnectionHandle {
    pub(crate) fn new(id: ConnectionId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting
    pub fn try_deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Whether the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}
