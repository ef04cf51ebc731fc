//! Watch session state machine
//!
//! Tracks one connection from connect to disconnect and which track its
//! reported points are addressed to.

use std::time::Instant;

use crate::track::TrackId;
use crate::watch::{ConnectionHandle, ConnectionId};

/// Session lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Authenticated, not watching anything
    Connected,
    /// Watching at least one track; points go to this one
    Watching(TrackId),
    /// Connection closed
    Disconnected,
}

/// Per-connection session state
#[derive(Debug)]
pub struct WatchSession {
    /// Handle registered with the watch registry
    conn: ConnectionHandle,

    /// Authenticated principal
    pub principal: String,

    /// Current phase
    pub phase: SessionPhase,

    /// Watched tracks, in join order
    watching: Vec<TrackId>,

    /// Connection start time
    pub connected_at: Instant,

    /// Points this connection reported
    pub points_reported: u64,
}

impl WatchSession {
    /// Create a new session state
    pub fn new(conn: ConnectionHandle, principal: impl Into<String>) -> Self {
        Self {
            conn,
            principal: principal.into(),
            phase: SessionPhase::Connected,
            watching: Vec::new(),
            connected_at: Instant::now(),
            points_reported: 0,
        }
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Registry handle of this connection
    pub fn handle(&self) -> &ConnectionHandle {
        &self.conn
    }

    /// Track that reported points are addressed to
    pub fn target(&self) -> Option<&TrackId> {
        match &self.phase {
            SessionPhase::Watching(track) => Some(track),
            _ => None,
        }
    }

    /// Tracks being watched, in join order
    pub fn watching(&self) -> &[TrackId] {
        &self.watching
    }

    /// Record a joined room; it becomes the point target
    pub fn on_watch(&mut self, track: TrackId) {
        if self.phase == SessionPhase::Disconnected {
            return;
        }
        self.watching.retain(|t| *t != track);
        self.watching.push(track.clone());
        self.phase = SessionPhase::Watching(track);
    }

    /// Record a left room
    ///
    /// If it was the target, the most recently joined remaining room takes
    /// over.
    pub fn on_unwatch(&mut self, track: &TrackId) -> bool {
        let before = self.watching.len();
        self.watching.retain(|t| t != track);
        let removed = self.watching.len() != before;

        if removed && self.phase != SessionPhase::Disconnected {
            self.phase = match self.watching.last() {
                Some(last) => SessionPhase::Watching(last.clone()),
                None => SessionPhase::Connected,
            };
        }
        removed
    }

    /// Close the session
    pub fn on_disconnect(&mut self) {
        self.watching.clear();
        self.phase = SessionPhase::Disconnected;
    }

    /// Check if session is watching anything
    pub fn is_watching(&self) -> bool {
        matches!(self.phase, SessionPhase::Watching(_))
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn session() -> WatchSession {
        let (tx, _rx) = mpsc::channel(1);
        WatchSession::new(ConnectionHandle::new(1, tx), "sam")
    }

    #[test]
    fn test_session_lifecycle() {
        let mut s = session();
        assert_eq!(s.phase, SessionPhase::Connected);
        assert!(s.target().is_none());

        s.on_watch(TrackId::new("42"));
        assert_eq!(s.phase, SessionPhase::Watching(TrackId::new("42")));
        assert_eq!(s.target(), Some(&TrackId::new("42")));

        s.on_disconnect();
        assert_eq!(s.phase, SessionPhase::Disconnected);
        assert!(s.watching().is_empty());

        // No way back from disconnected
        s.on_watch(TrackId::new("1"));
        assert_eq!(s.phase, SessionPhase::Disconnected);
    }

    #[test]
    fn test_target_follows_latest_join() {
        let mut s = session();
        s.on_watch(TrackId::new("1"));
        s.on_watch(TrackId::new("2"));
        assert_eq!(s.target(), Some(&TrackId::new("2")));

        // Re-watching moves a track to the end
        s.on_watch(TrackId::new("1"));
        assert_eq!(s.watching(), &[TrackId::new("2"), TrackId::new("1")]);
        assert_eq!(s.target(), Some(&TrackId::new("1")));
    }

    #[test]
    fn test_unwatch_falls_back() {
        let mut s = session();
        s.on_watch(TrackId::new("1"));
        s.on_watch(TrackId::new("2"));

        assert!(s.on_unwatch(&TrackId::new("2")));
        assert_eq!(s.target(), Some(&TrackId::new("1")));

        assert!(!s.on_unwatch(&TrackId::new("9")));

        assert!(s.on_unwatch(&TrackId::new("1")));
        assert_eq!(s.phase, SessionPhase::Connected);
        assert!(!s.is_watching());
    }
}
