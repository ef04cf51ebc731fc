//! Statistics and metrics for live tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Service-wide counters
///
/// Updated lock-free from every connection task; read through
/// [`LiveStats::snapshot`].
#[derive(Debug)]
pub struct LiveStats {
    started_at: Instant,
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    points_reported: AtomicU64,
    points_persisted: AtomicU64,
    points_unrouted: AtomicU64,
    points_rejected: AtomicU64,
    persist_failures: AtomicU64,
    deliveries: AtomicU64,
    dropped_deliveries: AtomicU64,
}

impl LiveStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            points_reported: AtomicU64::new(0),
            points_persisted: AtomicU64::new(0),
            points_unrouted: AtomicU64::new(0),
            points_rejected: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            dropped_deliveries: AtomicU64::new(0),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn point_reported(&self) {
        self.points_reported.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn point_persisted(&self, delivered: usize, dropped: usize) {
        self.points_persisted.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.dropped_deliveries
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub(crate) fn point_unrouted(&self) {
        self.points_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn point_rejected(&self) {
        self.points_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn persist_failed(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            points_reported: self.points_reported.load(Ordering::Relaxed),
            points_persisted: self.points_persisted.load(Ordering::Relaxed),
            points_unrouted: self.points_unrouted.load(Ordering::Relaxed),
            points_rejected: self.points_rejected.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped_deliveries: self.dropped_deliveries.load(Ordering::Relaxed),
        }
    }
}

impl Default for LiveStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`LiveStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the service started
    pub uptime: Duration,
    /// Connections ever accepted
    pub connections_total: u64,
    /// Connections currently open
    pub connections_active: u64,
    /// `new point` events received
    pub points_reported: u64,
    /// Points appended to a track
    pub points_persisted: u64,
    /// Points received while not watching any track
    pub points_unrouted: u64,
    /// Points that failed to decode or validate
    pub points_rejected: u64,
    /// Points the store refused
    pub persist_failures: u64,
    /// Frames queued to watchers
    pub deliveries: u64,
    /// Frames dropped for lagging or closed watchers
    pub dropped_deliveries: u64,
}

impl StatsSnapshot {
    /// Points persisted per second of uptime
    pub fn persist_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.points_persisted as f64 / secs
        } else {
            0.0
        }
    }
}
