//! Track repository
//!
//! Reads and writes tracks against a [`KvStore`]. The repository is the only
//! component that knows the key layout and the only owner of durable track
//! state.

use std::future::Future;

use futures::future::join_all;

use crate::store::{KvStore, StoreError, StoreResult};

use super::config::RepositoryConfig;
use super::error::TrackError;
use super::model::{Track, TrackHeader, TrackId};
use super::point::{self, Point};

/// Access to tracks and their ordered points
///
/// Holds no locks of its own. Point appends rely on the store's atomic list
/// push, so any number of callers may append to the same track at once.
pub struct TrackRepository<S: KvStore> {
    store: S,
    config: RepositoryConfig,
}

impl<S: KvStore> TrackRepository<S> {
    /// Create a repository with default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    /// Create a repository with custom configuration
    pub fn with_config(store: S, config: RepositoryConfig) -> Self {
        Self { store, config }
    }

    /// Get the repository configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Get the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a store call under the configured timeout
    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, TrackError> {
        let result = match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.store_timeout)),
        };

        result.map_err(|e| {
            tracing::warn!(op = op, error = %e, "Store call failed");
            TrackError::StoreUnavailable(e)
        })
    }

    /// Every known track identifier, in the store's catalog order
    pub async fn list_all_identifiers(&self) -> Result<Vec<TrackId>, TrackError> {
        let members = self
            .bounded("list", self.store.sorted_members(&self.config.catalog_key))
            .await?;

        Ok(members.iter().map(|m| TrackId::from_key(m)).collect())
    }

    /// Load only the scalar header fields of a track
    ///
    /// Returns `None` if the track has no stored header.
    pub async fn load_header(&self, id: &TrackId) -> Result<Option<TrackHeader>, TrackError> {
        let fields = self
            .bounded("load_header", self.store.hash_get_all(&id.key()))
            .await?;

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(fields.into_iter().collect()))
    }

    /// Load every point of a track, in append order
    ///
    /// One undecodable point fails the whole read.
    pub async fn load_points(&self, id: &TrackId) -> Result<Vec<Point>, TrackError> {
        let raw = self
            .bounded("load_points", self.store.list_range(&id.points_key()))
            .await?;

        raw.iter()
            .enumerate()
            .map(|(index, text)| {
                point::decode(text).map_err(|source| {
                    tracing::error!(
                        track = %id,
                        index = index,
                        error = %source,
                        "Corrupt point in store"
                    );
                    TrackError::CorruptTrackData {
                        id: id.clone(),
                        index,
                        source,
                    }
                })
            })
            .collect()
    }

    /// Load a track with its points
    ///
    /// Points are not read when the header is missing.
    pub async fn load_full(&self, id: &TrackId) -> Result<Option<Track>, TrackError> {
        let Some(header) = self.load_header(id).await? else {
            return Ok(None);
        };

        let points = self.load_points(id).await?;

        Ok(Some(Track::new(id.clone(), header, points)))
    }

    /// Append a point to a track
    ///
    /// Returns the track's new point count; the point's index is one less.
    pub async fn append_point(&self, id: &TrackId, point: &Point) -> Result<u64, TrackError> {
        point.validate()?;

        let len = self
            .bounded(
                "append_point",
                self.store.list_push(&id.points_key(), point::encode(point)),
            )
            .await?;

        tracing::debug!(track = %id, index = len - 1, "Point appended");

        Ok(len)
    }

    /// Number of points stored for a track
    pub async fn point_count(&self, id: &TrackId) -> Result<u64, TrackError> {
        self.bounded("point_count", self.store.list_len(&id.points_key()))
            .await
    }

    /// Store a track header and list the track in the catalog
    ///
    /// Existing header fields not present in `header` are kept.
    pub async fn create_track(&self, id: &TrackId, header: &TrackHeader) -> Result<(), TrackError> {
        if header.is_empty() {
            return Err(TrackError::EmptyHeader(id.clone()));
        }

        let fields: Vec<(String, String)> = header
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.bounded("create_header", self.store.hash_set(&id.key(), &fields))
            .await?;
        let added = self
            .bounded(
                "create_catalog",
                self.store.sorted_add(&self.config.catalog_key, &id.key(), 0.0),
            )
            .await?;

        tracing::info!(track = %id, new = added, "Track stored");

        Ok(())
    }

    /// Every listed track, fully loaded, in catalog order
    ///
    /// Identifiers whose header is gone are left out. Any other failure
    /// aborts the whole listing.
    pub async fn get_all_tracks(&self) -> Result<Vec<Track>, TrackError> {
        let ids = self.list_all_identifiers().await?;
        let listed = ids.len();

        let mut tracks = Vec::with_capacity(listed);
        for batch in ids.chunks(self.config.max_concurrent_loads.max(1)) {
            let loaded = join_all(batch.iter().map(|id| self.load_full(id))).await;

            for (id, result) in batch.iter().zip(loaded) {
                match result? {
                    Some(track) => tracks.push(track),
                    None => tracing::debug!(track = %id, "Dropping catalog entry without header"),
                }
            }
        }

        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::protocol::ServerEvent;
    use crate::store::testing::{OfflineStore, StalledStore};
    use crate::store::MemoryStore;

    fn header(name: &str) -> TrackHeader {
        let mut header = TrackHeader::new();
        header.insert("name".into(), name.into());
        header
    }

    #[tokio::test]
    async fn test_load_full_nonexistent() {
        let repo = TrackRepository::new(MemoryStore::new());

        let track = repo.load_full(&TrackId::new("nonexistent")).await.unwrap();
        assert!(track.is_none());
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let repo = TrackRepository::new(MemoryStore::new());
        let id = TrackId::new("42");

        repo.create_track(&id, &header("Commute")).await.unwrap();
        assert_eq!(repo.point_count(&id).await.unwrap(), 0);

        let track = repo.load_full(&id).await.unwrap().unwrap();
        assert_eq!(track.name(), Some("Commute"));
        assert!(track.points.is_empty());

        assert_eq!(repo.append_point(&id, &Point::new(10.0, 20.0)).await.unwrap(), 1);
        assert_eq!(repo.append_point(&id, &Point::new(10.5, 20.5)).await.unwrap(), 2);

        let track = repo.load_full(&id).await.unwrap().unwrap();
        assert_eq!(
            track.points,
            vec![Point::new(10.0, 20.0), Point::new(10.5, 20.5)]
        );
    }

    #[tokio::test]
    async fn test_points_without_header_are_not_read() {
        let store = Arc::new(MemoryStore::new());
        let repo = TrackRepository::new(Arc::clone(&store));
        let id = TrackId::new("orphan");

        // Garbage points would fail the read if it happened
        store
            .list_push(&id.points_key(), "not json".into())
            .await
            .unwrap();

        assert!(repo.load_full(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_point_fails_whole_read() {
        let store = Arc::new(MemoryStore::new());
        let repo = TrackRepository::new(Arc::clone(&store));
        let id = TrackId::new("1");

        repo.create_track(&id, &header("Hike")).await.unwrap();
        repo.append_point(&id, &Point::new(1.0, 1.0)).await.unwrap();
        store
            .list_push(&id.points_key(), r#"{"lat":"x"}"#.into())
            .await
            .unwrap();
        repo.append_point(&id, &Point::new(3.0, 3.0)).await.unwrap();

        let err = repo.load_points(&id).await.unwrap_err();
        match err {
            TrackError::CorruptTrackData { id: bad, index, .. } => {
                assert_eq!(bad, id);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            repo.load_full(&id).await,
            Err(TrackError::CorruptTrackData { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_append_rejects_invalid_point() {
        let repo = TrackRepository::new(MemoryStore::new());
        let id = TrackId::new("1");

        let result = repo.append_point(&id, &Point::new(f64::NAN, 0.0)).await;
        assert!(matches!(result, Err(TrackError::InvalidPoint(_))));
        assert_eq!(repo.point_count(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_point() {
        let repo = Arc::new(TrackRepository::new(MemoryStore::new()));
        let id = TrackId::new("busy");
        repo.create_track(&id, &header("Busy")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let repo = Arc::clone(&repo);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                repo.append_point(&id, &Point::new(i as f64, 0.0).at(i))
                    .await
                    .unwrap()
            }));
        }

        let mut accepted = Vec::new();
        for (i, handle) in handles.into_iter().enumerate() {
            accepted.push((i as i64, handle.await.unwrap()));
        }

        let mut indices: Vec<u64> = accepted.iter().map(|&(_, len)| len).collect();
        indices.sort_unstable();
        assert_eq!(indices, (1..=50).collect::<Vec<u64>>());

        let points = repo.load_points(&id).await.unwrap();
        assert_eq!(points.len(), 50);

        // Each point sits where the store said it was accepted
        for (time, len) in accepted {
            assert_eq!(points[(len - 1) as usize].time, Some(time));
        }
    }

    #[tokio::test]
    async fn test_append_order_matches_acceptance_order() {
        let repo = TrackRepository::new(MemoryStore::new());
        let id = TrackId::new("seq");

        for i in 0..10 {
            repo.append_point(&id, &Point::new(0.0, i as f64)).await.unwrap();
        }

        let lons: Vec<f64> = repo
            .load_points(&id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.lon)
            .collect();
        assert_eq!(lons, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_load_full_shadows_reserved_header_fields() {
        let repo = TrackRepository::new(MemoryStore::new());
        let id = TrackId::new("42");
        let stored = TrackHeader::from([
            ("id".to_string(), "42".to_string()),
            ("points".to_string(), "3".to_string()),
            ("name".to_string(), "Ride".to_string()),
        ]);
        repo.create_track(&id, &stored).await.unwrap();
        repo.append_point(&id, &Point::new(1.0, 2.0)).await.unwrap();

        let track = repo.load_full(&id).await.unwrap().unwrap();
        assert_eq!(track.header, header("Ride"));
        assert_eq!(track.points, vec![Point::new(1.0, 2.0)]);

        let frame = ServerEvent::Track(track.clone()).to_frame().unwrap();
        assert_eq!(
            ServerEvent::from_frame(&frame).unwrap(),
            ServerEvent::Track(track)
        );
    }

    #[tokio::test]
    async fn test_get_all_tracks_drops_dangling_ids() {
        let store = Arc::new(MemoryStore::new());
        let repo = TrackRepository::new(Arc::clone(&store));

        repo.create_track(&TrackId::new("1"), &header("One")).await.unwrap();
        repo.create_track(&TrackId::new("2"), &header("Two")).await.unwrap();
        assert_eq!(
            repo.list_all_identifiers().await.unwrap(),
            vec![TrackId::new("1"), TrackId::new("2")]
        );

        // Header removed behind the repository's back
        store.delete("track:2").await.unwrap();

        let tracks = repo.get_all_tracks().await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, TrackId::new("1"));
    }

    #[tokio::test]
    async fn test_get_all_tracks_aborts_on_corruption() {
        let store = Arc::new(MemoryStore::new());
        let repo = TrackRepository::new(Arc::clone(&store));

        repo.create_track(&TrackId::new("a"), &header("A")).await.unwrap();
        repo.create_track(&TrackId::new("b"), &header("B")).await.unwrap();
        store
            .list_push("track:b:points", "{".into())
            .await
            .unwrap();

        assert!(matches!(
            repo.get_all_tracks().await,
            Err(TrackError::CorruptTrackData { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let repo = TrackRepository::new(OfflineStore);
        let id = TrackId::new("1");

        assert!(matches!(
            repo.list_all_identifiers().await,
            Err(TrackError::StoreUnavailable(StoreError::Unavailable(_)))
        ));
        assert!(matches!(
            repo.load_full(&id).await,
            Err(TrackError::StoreUnavailable(_))
        ));
        assert!(matches!(
            repo.append_point(&id, &Point::new(0.0, 0.0)).await,
            Err(TrackError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let config = RepositoryConfig::default().store_timeout(Duration::from_millis(20));
        let repo = TrackRepository::with_config(StalledStore, config);

        let result = repo.load_header(&TrackId::new("1")).await;
        assert_eq!(
            result,
            Err(TrackError::StoreUnavailable(StoreError::Timeout(
                Duration::from_millis(20)
            )))
        );
    }

    #[tokio::test]
    async fn test_create_track_requires_header() {
        let repo = TrackRepository::new(MemoryStore::new());

        let result = repo.create_track(&TrackId::new("1"), &TrackHeader::new()).await;
        assert_eq!(result, Err(TrackError::EmptyHeader(TrackId::new("1"))));
        assert!(repo.list_all_identifiers().await.unwrap().is_empty());
    }
}
