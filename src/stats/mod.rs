//! Service statistics

pub mod metrics;

pub use metrics::{LiveStats, StatsSnapshot};
