//! Live point broadcast
//!
//! A connection moves through three phases:
//!
//! ```text
//!   Connected ──watch track──► Watching(track) ──disconnect──► Disconnected
//!       ▲                          │    ▲
//!       └──── unwatch (last) ──────┘    └── watch track (another room)
//! ```
//!
//! While watching, each `new point` is appended to the most recently joined
//! track and then sent to every other connection in that track's room.

pub mod service;
pub mod session;

pub use service::{LiveService, PointOutcome, Rejection};
pub use session::{SessionPhase, WatchSession};
