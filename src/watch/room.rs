//! Room entry and statistics types
//!
//! This module defines the per-track state stored in the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::connection::{ConnectionHandle, ConnectionId};

/// Entry for a single track room in the registry
pub struct RoomEntry {
    /// Current members keyed by connection
    pub(super) members: HashMap<ConnectionId, ConnectionHandle>,

    /// Broadcasts issued to this room
    pub(super) broadcasts: AtomicU64,

    /// Frames queued to members
    pub(super) delivered: AtomicU64,

    /// Frames that could not be queued
    pub(super) dropped: AtomicU64,

    /// When the room was created
    pub created_at: Instant,
}

impl RoomEntry {
    pub(super) fn new() -> Self {
        Self {
            members: HashMap::new(),
            broadcasts: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Get the number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check whether a connection is a member
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    pub(super) fn stats(&self) -> RoomStats {
        RoomStats {
            member_count: self.members.len(),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a room
#[derive(Debug, Clone)]
pub struct RoomStats {
    /// Number of watching connections
    pub member_count: usize,
    /// Broadcasts issued to the room
    pub broadcasts: u64,
    /// Frames queued to members
    pub delivered: u64,
    /// Frames dropped (full or closed queues)
    pub dropped: u64,
    /// Time since the room was created
    pub age: Duration,
}

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members targeted (origin excluded)
    pub recipients: usize,
    /// Frames queued
    pub delivered: usize,
    /// Frames dropped
    pub dropped: usize,
}
