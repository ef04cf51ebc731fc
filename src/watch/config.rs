//! Watch registry configuration

use std::time::Duration;

/// Shortest accepted prune interval
pub const MIN_PRUNE_INTERVAL: Duration = Duration::from_millis(10);

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames queued per connection before deliveries are dropped
    pub outbound_capacity: usize,

    /// How often members with a closed connection are pruned
    pub prune_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            prune_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the per-connection outbound queue capacity (at least 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the prune interval (at least [`MIN_PRUNE_INTERVAL`])
    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval.max(MIN_PRUNE_INTERVAL);
        self
    }
}
