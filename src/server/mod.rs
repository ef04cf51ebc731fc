//! Live tracking server
//!
//! Accepts TCP connections, authenticates them through an [`Authenticator`]
//! and runs one task per connection against a shared [`LiveService`].
//!
//! [`LiveService`]: crate::live::LiveService

pub mod auth;
pub mod config;
pub mod connection;
pub mod listener;

pub use auth::{AllowAll, Authenticator, ConnectionContext, Principal, StaticTokens};
pub use config::{ServerConfig, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};
pub use connection::Connection;
pub use listener::TrackServer;
