//! Track storage
//!
//! Tracks are named, ordered collections of location points. This module
//! holds the point codec, the data model, the repository that persists both
//! against a [`KvStore`](crate::store::KvStore), and the catalog used for
//! listing.
//!
//! # Read paths
//!
//! ```text
//!   load_full(id)                       resolve_all()
//!        │                                   │
//!        ▼                                   ▼
//!   HGETALL track:<id> ── empty? ─► None   ZRANGE tracks 0 -1
//!        │                                   │
//!        ▼                                   ▼  (per id, batched)
//!   LRANGE track:<id>:points              load_full(id) ── None? ─► dropped
//!        │
//!        ▼
//!   decode each point ── any failure ─► CorruptTrackData { index }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod point;
pub mod repository;

pub use catalog::TrackCatalog;
pub use config::RepositoryConfig;
pub use error::TrackError;
pub use model::{Track, TrackHeader, TrackId};
pub use point::{DecodeError, InvalidPoint, Point};
pub use repository::TrackRepository;
