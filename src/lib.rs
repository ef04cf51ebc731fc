//! GPS track store with live point broadcast
//!
//! Tracks are ordered, append-only sequences of location points kept in a
//! key-value store. Clients that watch a track receive every point other
//! clients report for it, as soon as the point has been stored.
//!
//! # Example
//!
//! ```no_run
//! use trackcast::{AllowAll, MemoryStore, ServerConfig, TrackRepository, TrackServer};
//!
//! #[tokio::main]
//! async fn main() -> trackcast::Result<()> {
//!     let repository = TrackRepository::new(MemoryStore::new());
//!     let server = TrackServer::new(ServerConfig::default(), repository, AllowAll);
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod live;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod store;
pub mod track;
pub mod watch;

pub use error::{Error, ProtocolError, Result};
pub use live::{LiveService, PointOutcome, WatchSession};
pub use protocol::{ClientEvent, ServerEvent};
pub use server::{AllowAll, Authenticator, Principal, ServerConfig, StaticTokens, TrackServer};
pub use stats::StatsSnapshot;
pub use store::{KvStore, MemoryStore, RedisStore, StoreError};
pub use track::{Point, Track, TrackCatalog, TrackError, TrackHeader, TrackId, TrackRepository};
pub use watch::{RegistryConfig, WatchRegistry};
