//! Watch registry implementation
//!
//! The central registry that tracks which connections watch which tracks
//! and fans new points out to them.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::ServerEvent;
use crate::track::{Point, TrackId};

use super::config::{RegistryConfig, MIN_PRUNE_INTERVAL};
use super::connection::{ConnectionHandle, ConnectionId, DeliveryError};
use super::room::{BroadcastReport, RoomEntry, RoomStats};

#[derive(Default)]
struct Rooms {
    /// Room per watched track
    rooms: HashMap<TrackId, RoomEntry>,
    /// Rooms each connection belongs to, in join order
    memberships: HashMap<ConnectionId, Vec<TrackId>>,
}

impl Rooms {
    fn remove_member(&mut self, id: ConnectionId, track: &TrackId) -> bool {
        let Some(room) = self.rooms.get_mut(track) else {
            return false;
        };

        let removed = room.members.remove(&id).is_some();
        if room.members.is_empty() {
            self.rooms.remove(track);
            tracing::debug!(track = %track, "Room closed");
        }
        removed
    }

    fn forget_membership(&mut self, id: ConnectionId, track: &TrackId) {
        let now_empty = match self.memberships.get_mut(&id) {
            Some(tracks) => {
                tracks.retain(|t| t != track);
                tracks.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.memberships.remove(&id);
        }
    }
}

/// Registry of track rooms
///
/// Thread-safe via `RwLock`. Broadcasts only need the read lock, so rooms
/// fan out concurrently; membership changes take the write lock, which
/// orders them against every broadcast issued after they return.
pub struct WatchRegistry {
    inner: RwLock<Rooms>,

    /// Configuration
    config: RegistryConfig,
}

impl WatchRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(Rooms::default()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Create the outbound queue for a new connection
    ///
    /// The connection is not in any room until it joins one.
    pub fn connect(&self, id: ConnectionId) -> (ConnectionHandle, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        (ConnectionHandle::new(id, tx), rx)
    }

    /// Add a connection to a track's room
    ///
    /// Returns false if it was already a member.
    pub async fn join(&self, conn: &ConnectionHandle, track: &TrackId) -> bool {
        let mut inner = self.inner.write().await;

        let room = inner.rooms.entry(track.clone()).or_insert_with(|| {
            tracing::debug!(track = %track, "Room opened");
            RoomEntry::new()
        });

        if room.members.insert(conn.id(), conn.clone()).is_some() {
            return false;
        }
        let members = room.member_count();

        inner
            .memberships
            .entry(conn.id())
            .or_default()
            .push(track.clone());

        tracing::info!(
            track = %track,
            conn = conn.id(),
            watchers = members,
            "Watcher joined"
        );

        true
    }

    /// Remove a connection from a track's room
    ///
    /// Leaving a room that was never joined is a no-op.
    pub async fn leave(&self, id: ConnectionId, track: &TrackId) -> bool {
        let mut inner = self.inner.write().await;

        inner.forget_membership(id, track);
        let removed = inner.remove_member(id, track);
        if removed {
            tracing::info!(track = %track, conn = id, "Watcher left");
        }
        removed
    }

    /// Remove a connection from every room
    ///
    /// Returns the tracks it was watching.
    pub async fn leave_all(&self, id: ConnectionId) -> Vec<TrackId> {
        let mut inner = self.inner.write().await;

        let tracks = inner.memberships.remove(&id).unwrap_or_default();
        for track in &tracks {
            inner.remove_member(id, track);
        }

        if !tracks.is_empty() {
            tracing::info!(conn = id, rooms = tracks.len(), "Watcher left all rooms");
        }
        tracks
    }

    /// Deliver a point to every member of a track's room except `exclude`
    ///
    /// Delivery never waits on a recipient: a member whose queue is full or
    /// closed misses this point and the others are unaffected.
    pub async fn broadcast(
        &self,
        track: &TrackId,
        point: &Point,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let frame = match ServerEvent::NewPoint(*point).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(track = %track, error = %e, "Failed to encode point");
                return BroadcastReport::default();
            }
        };

        self.broadcast_frame(track, frame, exclude).await
    }

    /// Deliver a pre-encoded frame to a track's room
    ///
    /// The frame is shared by reference count, not copied per member.
    pub async fn broadcast_frame(
        &self,
        track: &TrackId,
        frame: Bytes,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let inner = self.inner.read().await;
        let mut report = BroadcastReport::default();

        let Some(room) = inner.rooms.get(track) else {
            return report;
        };
        room.broadcasts.fetch_add(1, Ordering::Relaxed);

        for (&id, member) in &room.members {
            if Some(id) == exclude {
                continue;
            }
            report.recipients += 1;

            match member.try_deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.dropped += 1;
                    match e {
                        DeliveryError::QueueFull => tracing::warn!(
                            track = %track,
                            conn = id,
                            "Watcher lagging, point dropped"
                        ),
                        DeliveryError::Closed => tracing::debug!(
                            track = %track,
                            conn = id,
                            "Watcher gone, point dropped"
                        ),
                    }
                }
            }
        }

        room.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        room.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);

        report
    }

    /// Rooms a connection belongs to, in join order
    pub async fn rooms_of(&self, id: ConnectionId) -> Vec<TrackId> {
        self.inner
            .read()
            .await
            .memberships
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Check whether a connection is watching a track
    pub async fn is_watching(&self, id: ConnectionId, track: &TrackId) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(track)
            .is_some_and(|room| room.contains(id))
    }

    /// Get room statistics
    pub async fn room_stats(&self, track: &TrackId) -> Option<RoomStats> {
        self.inner.read().await.rooms.get(track).map(RoomEntry::stats)
    }

    /// Get total number of open rooms
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Get total number of connections in at least one room
    pub async fn watcher_count(&self) -> usize {
        self.inner.read().await.memberships.len()
    }

    /// Run pruning once
    ///
    /// Removes members whose connection dropped without leaving. Returns the
    /// number of memberships removed.
    pub async fn prune(&self) -> usize {
        let mut inner = self.inner.write().await;

        let stale: Vec<(ConnectionId, TrackId)> = inner
            .rooms
            .iter()
            .flat_map(|(track, room)| {
                room.members
                    .values()
                    .filter(|member| member.is_closed())
                    .map(move |member| (member.id(), track.clone()))
            })
            .collect();

        for (id, track) in &stale {
            inner.remove_member(*id, track);
            inner.forget_membership(*id, track);
            tracing::info!(track = %track, conn = *id, "Stale watcher pruned");
        }

        stale.len()
    }

    /// Spawn background prune task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_prune_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.prune_interval.max(MIN_PRUNE_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.prune().await;
            }
        })
    }
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
