//! Track catalog
//!
//! The discoverable list of tracks. Listing is a compound read: fetch the
//! sorted identifiers, then bulk-load each track. Identifiers that no longer
//! have a stored header are dropped rather than failing the listing, so the
//! catalog tolerates drift between the sorted set and the headers.

use std::sync::Arc;

use crate::store::KvStore;

use super::error::TrackError;
use super::model::{Track, TrackId};
use super::repository::TrackRepository;

/// Listing view over a [`TrackRepository`]
pub struct TrackCatalog<S: KvStore> {
    repository: Arc<TrackRepository<S>>,
}

impl<S: KvStore> TrackCatalog<S> {
    /// Create a catalog over a shared repository
    pub fn new(repository: Arc<TrackRepository<S>>) -> Self {
        Self { repository }
    }

    /// Sorted identifiers, including ones that may no longer resolve
    pub async fn identifiers(&self) -> Result<Vec<TrackId>, TrackError> {
        self.repository.list_all_identifiers().await
    }

    /// Every track that still resolves, fully loaded, in catalog order
    pub async fn resolve_all(&self) -> Result<Vec<Track>, TrackError> {
        let tracks = self.repository.get_all_tracks().await?;
        tracing::debug!(tracks = tracks.len(), "Catalog resolved");
        Ok(tracks)
    }
}

impl<S: KvStore> Clone for TrackCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::OfflineStore;
    use crate::store::MemoryStore;
    use crate::track::{Point, TrackHeader};

    fn header(name: &str) -> TrackHeader {
        TrackHeader::from([("name".to_string(), name.to_string())])
    }

    #[tokio::test]
    async fn test_resolve_all_with_drift() {
        let store = Arc::new(MemoryStore::new());
        let repository = Arc::new(TrackRepository::new(Arc::clone(&store)));
        let catalog = TrackCatalog::new(Arc::clone(&repository));

        repository
            .create_track(&TrackId::new("1"), &header("First"))
            .await
            .unwrap();
        repository
            .create_track(&TrackId::new("2"), &header("Second"))
            .await
            .unwrap();
        repository
            .append_point(&TrackId::new("1"), &Point::new(5.0, 6.0))
            .await
            .unwrap();

        store.delete("track:2").await.unwrap();

        // The catalog still lists both identifiers
        assert_eq!(catalog.identifiers().await.unwrap().len(), 2);

        let tracks = catalog.resolve_all().await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id.key(), "track:1");
        assert_eq!(tracks[0].points, vec![Point::new(5.0, 6.0)]);
    }

    #[tokio::test]
    async fn test_resolve_all_sorted() {
        let repository = Arc::new(TrackRepository::new(MemoryStore::new()));
        let catalog = TrackCatalog::new(Arc::clone(&repository));

        for id in ["b", "c", "a"] {
            repository
                .create_track(&TrackId::new(id), &header(id))
                .await
                .unwrap();
        }

        let names: Vec<String> = catalog
            .resolve_all()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|t| t.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let catalog = TrackCatalog::new(Arc::new(TrackRepository::new(MemoryStore::new())));
        assert!(catalog.resolve_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_fails_listing() {
        let catalog = TrackCatalog::new(Arc::new(TrackRepository::new(OfflineStore)));
        assert!(matches!(
            catalog.resolve_all().await,
            Err(TrackError::StoreUnavailable(_))
        ));
    }
}
