//! Track repository configuration

use std::time::Duration;

/// Repository configuration options
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Upper bound on any single backing store call
    pub store_timeout: Duration,

    /// Key of the sorted set listing every track
    pub catalog_key: String,

    /// How many tracks `get_all_tracks` loads at once
    pub max_concurrent_loads: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            catalog_key: "tracks".to_string(),
            max_concurrent_loads: 16,
        }
    }
}

impl RepositoryConfig {
    /// Set the store call timeout
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the catalog key
    pub fn catalog_key(mut self, key: impl Into<String>) -> Self {
        self.catalog_key = key.into();
        self
    }

    /// Set the bulk load concurrency (at least 1)
    pub fn max_concurrent_loads(mut self, max: usize) -> Self {
        self.max_concurrent_loads = max.max(1);
        self
    }
}
