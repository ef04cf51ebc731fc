//! Live broadcast service
//!
//! Glues the repository and the watch registry together: reported points
//! are persisted first and fanned out to the rest of the room only once the
//! store has accepted them.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::protocol::{ClientEvent, ServerEvent};
use crate::stats::{LiveStats, StatsSnapshot};
use crate::store::KvStore;
use crate::track::{
    point, DecodeError, InvalidPoint, Point, TrackCatalog, TrackError, TrackId, TrackRepository,
};
use crate::watch::{BroadcastReport, ConnectionId, WatchRegistry};

use super::session::{SessionPhase, WatchSession};

/// Why a reported point was refused
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Payload was not a point
    Malformed(DecodeError),
    /// Coordinates out of range
    OutOfRange(InvalidPoint),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Malformed(e) => write!(f, "{}", e),
            Rejection::OutOfRange(e) => write!(f, "{}", e),
        }
    }
}

/// What happened to a reported point
#[derive(Debug, Clone, PartialEq)]
pub enum PointOutcome {
    /// Persisted at `index` and fanned out to the room
    Broadcast {
        index: u64,
        report: BroadcastReport,
    },
    /// Reporter is not watching any track; nothing stored or sent
    Unrouted,
    /// Payload refused before reaching the store
    Rejected(Rejection),
    /// Store refused the point; nothing was broadcast
    PersistFailed(TrackError),
}

impl PointOutcome {
    /// Check if the point reached the store
    pub fn is_persisted(&self) -> bool {
        matches!(self, PointOutcome::Broadcast { .. })
    }
}

/// Live tracking service shared by every connection task
pub struct LiveService<S: KvStore> {
    repository: Arc<TrackRepository<S>>,
    catalog: TrackCatalog<S>,
    registry: Arc<WatchRegistry>,
    stats: LiveStats,
}

impl<S: KvStore> LiveService<S> {
    /// Create a service over a repository and a registry
    pub fn new(repository: Arc<TrackRepository<S>>, registry: Arc<WatchRegistry>) -> Self {
        Self {
            catalog: TrackCatalog::new(Arc::clone(&repository)),
            repository,
            registry,
            stats: LiveStats::new(),
        }
    }

    /// Get the track repository
    pub fn repository(&self) -> &Arc<TrackRepository<S>> {
        &self.repository
    }

    /// Get the track catalog
    pub fn catalog(&self) -> &TrackCatalog<S> {
        &self.catalog
    }

    /// Get the watch registry
    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Current service counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Start a session for an authenticated connection
    ///
    /// The receiver yields every frame broadcast to this connection.
    pub fn open_session(
        &self,
        id: ConnectionId,
        principal: impl Into<String>,
    ) -> (WatchSession, mpsc::Receiver<Bytes>) {
        let (handle, outbound) = self.registry.connect(id);
        let session = WatchSession::new(handle, principal);

        self.stats.connection_opened();
        tracing::info!(conn = id, principal = %session.principal, "Session opened");

        (session, outbound)
    }

    /// Handle one client event
    ///
    /// Returns the reply for the sender, if the event has one.
    pub async fn handle(
        &self,
        session: &mut WatchSession,
        event: ClientEvent,
    ) -> Option<ServerEvent> {
        tracing::debug!(conn = session.id(), event = event.name(), "Handling event");

        match event {
            ClientEvent::Hello { .. } => Some(ServerEvent::error("already authenticated")),
            ClientEvent::WatchTrack { trackid } => Some(self.watch_track(session, trackid).await),
            ClientEvent::UnwatchTrack { trackid } => {
                self.unwatch_track(session, &trackid).await;
                None
            }
            ClientEvent::NewPoint(data) => {
                self.report_point(session, data).await;
                None
            }
            ClientEvent::GetTrack { trackid } => Some(self.get_track(trackid).await),
            ClientEvent::ListTracks => Some(self.list_tracks().await),
        }
    }

    /// Join a track's room
    ///
    /// Only points reported after the join are delivered; history is read
    /// with `get track`.
    ///
    /// Any track id may be watched. Points reported for a track without a
    /// header are still appended, but stay out of snapshots and listings
    /// until a header is created.
    pub async fn watch_track(&self, session: &mut WatchSession, track: TrackId) -> ServerEvent {
        let opened = self.registry.room_stats(&track).await.is_none();
        let newly = self.registry.join(session.handle(), &track).await;
        session.on_watch(track.clone());

        if newly {
            tracing::info!(conn = session.id(), track = %track, "Watching track");
        }

        if opened {
            if let Ok(None) = self.repository.load_header(&track).await {
                tracing::debug!(
                    track = %track,
                    "Room opened for a track without header; its points stay unlisted"
                );
            }
        }

        ServerEvent::Watching { trackid: track }
    }

    /// Leave a track's room
    pub async fn unwatch_track(&self, session: &mut WatchSession, track: &TrackId) -> bool {
        let left = self.registry.leave(session.id(), track).await;
        session.on_unwatch(track);

        if left {
            tracing::info!(conn = session.id(), track = %track, "Stopped watching track");
        }
        left
    }

    /// Decode and publish a raw `new point` payload
    pub async fn report_point(&self, session: &mut WatchSession, data: Value) -> PointOutcome {
        match point::decode_value(data) {
            Ok(point) => self.publish_point(session, point).await,
            Err(e) => {
                session.points_reported += 1;
                self.stats.point_reported();
                self.stats.point_rejected();
                tracing::warn!(conn = session.id(), error = %e, "Malformed point");
                PointOutcome::Rejected(Rejection::Malformed(e))
            }
        }
    }

    /// Persist a point on the session's target track, then fan it out
    ///
    /// The reporter is never among the recipients.
    pub async fn publish_point(&self, session: &mut WatchSession, point: Point) -> PointOutcome {
        session.points_reported += 1;
        self.stats.point_reported();

        if let Err(e) = point.validate() {
            self.stats.point_rejected();
            tracing::warn!(conn = session.id(), error = %e, "Point rejected");
            return PointOutcome::Rejected(Rejection::OutOfRange(e));
        }

        let Some(track) = session.target().cloned() else {
            self.stats.point_unrouted();
            tracing::debug!(conn = session.id(), "Point reported while not watching, ignored");
            return PointOutcome::Unrouted;
        };

        let len = match self.repository.append_point(&track, &point).await {
            Ok(len) => len,
            Err(e) => {
                self.stats.persist_failed();
                tracing::warn!(
                    conn = session.id(),
                    track = %track,
                    error = %e,
                    "Failed to persist point, not broadcasting"
                );
                return PointOutcome::PersistFailed(e);
            }
        };

        let report = self
            .registry
            .broadcast(&track, &point, Some(session.id()))
            .await;
        self.stats.point_persisted(report.delivered, report.dropped);

        tracing::debug!(
            conn = session.id(),
            track = %track,
            index = len.saturating_sub(1),
            delivered = report.delivered,
            dropped = report.dropped,
            "Point published"
        );

        PointOutcome::Broadcast {
            index: len.saturating_sub(1),
            report,
        }
    }

    /// Snapshot of one track
    pub async fn get_track(&self, track: TrackId) -> ServerEvent {
        match self.repository.load_full(&track).await {
            Ok(Some(full)) => ServerEvent::Track(full),
            Ok(None) => ServerEvent::NotFound { trackid: track },
            Err(e) => {
                tracing::warn!(track = %track, error = %e, "Failed to load track");
                ServerEvent::error("track unavailable")
            }
        }
    }

    /// Every listed track
    pub async fn list_tracks(&self) -> ServerEvent {
        match self.catalog.resolve_all().await {
            Ok(tracks) => ServerEvent::Tracks(tracks),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list tracks");
                ServerEvent::error("tracks unavailable")
            }
        }
    }

    /// End a session and leave every room it joined
    pub async fn close_session(&self, session: &mut WatchSession) {
        if session.phase == SessionPhase::Disconnected {
            return;
        }

        let rooms = self.registry.leave_all(session.id()).await;
        session.on_disconnect();
        self.stats.connection_closed();

        tracing::info!(
            conn = session.id(),
            rooms = rooms.len(),
            points = session.points_reported,
            duration_ms = session.duration().as_millis() as u64,
            "Session closed"
        );
    }
}
