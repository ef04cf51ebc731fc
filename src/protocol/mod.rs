//! Wire protocol
//!
//! Connections exchange newline-delimited JSON events. Clients authenticate,
//! join track rooms and report points; the server acknowledges joins, answers
//! snapshot requests and pushes points reported by other watchers.

pub mod event;
pub mod framing;

pub use event::{ClientEvent, ServerEvent};
pub use framing::next_line;
