//! Watch registry for room-scoped fan-out
//!
//! Every watched track has a room: the set of connections that asked for
//! live updates on it. A new point is encoded once and queued to each other
//! member of the room.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<WatchRegistry>
//!                   ┌──────────────────────────┐
//!                   │ rooms: HashMap<TrackId,  │
//!                   │   RoomEntry {            │
//!                   │     members: {id→handle} │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Reporter]              [Watcher]               [Watcher]
//!   new point               outbound.recv()         outbound.recv()
//!        │                       │                       │
//!        └──► registry.broadcast()──► try_send ──► socket write
//! ```
//!
//! Each connection owns a bounded outbound queue. Fan-out uses `try_send`,
//! so one stalled or dead watcher never holds up the rest of the room.

pub mod config;
pub mod connection;
pub mod registry;
pub mod room;

pub use config::RegistryConfig;
pub use connection::{ConnectionHandle, ConnectionId, DeliveryError};
pub use registry::WatchRegistry;
pub use room::{BroadcastReport, RoomEntry, RoomStats};
