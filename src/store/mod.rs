//! Key-value backing store
//!
//! Tracks are persisted in a store that offers three primitives: hashes
//! (track headers), sorted sets (the track catalog) and lists (the
//! append-only point log of each track).
//!
//! # Layout
//!
//! ```text
//!   tracks               sorted set   track:1, track:2, ...   (score 0, lexical order)
//!   track:<id>           hash         name=..., other scalar fields
//!   track:<id>:points    list         {"lat":..,"lon":..}, ...
//! ```
//!
//! Two backends are provided: [`MemoryStore`] keeps everything in process and
//! [`RedisStore`] talks to a Redis server.

pub mod error;
pub mod memory;
pub mod redis_backend;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redis_backend::RedisStore;

/// Primitives the track repository needs from its backing store.
///
/// Every method may suspend. Implementations must make `list_push` atomic:
/// concurrent pushes to the same key are all kept, in the order the store
/// accepted them.
pub trait KvStore: Send + Sync + 'static {
    /// All fields of a hash. A missing key yields an empty map.
    fn hash_get_all(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<HashMap<String, String>>> + Send;

    /// Set several hash fields at once, creating the hash if needed.
    fn hash_set(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Add a member to a sorted set. Returns true if the member is new.
    fn sorted_add(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// All members of a sorted set, ordered by score then lexically.
    fn sorted_members(&self, key: &str) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Append a value to the tail of a list. Returns the new list length.
    fn list_push(&self, key: &str, value: String) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Every element of a list, head first.
    fn list_range(&self, key: &str) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Length of a list (0 if missing).
    fn list_len(&self, key: &str) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Delete a key of any type. Returns true if something was removed.
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;
}

impl<S: KvStore> KvStore for Arc<S> {
    fn hash_get_all(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<HashMap<String, String>>> + Send {
        (**self).hash_get_all(key)
    }

    fn hash_set(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> impl Future<Output = StoreResult<()>> + Send {
        (**self).hash_set(key, fields)
    }

    fn sorted_add(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).sorted_add(key, member, score)
    }

    fn sorted_members(&self, key: &str) -> impl Future<Output = StoreResult<Vec<String>>> + Send {
        (**self).sorted_members(key)
    }

    fn list_push(&self, key: &str, value: String) -> impl Future<Output = StoreResult<u64>> + Send {
        (**self).list_push(key, value)
    }

    fn list_range(&self, key: &str) -> impl Future<Output = StoreResult<Vec<String>>> + Send {
        (**self).list_range(key)
    }

    fn list_len(&self, key: &str) -> impl Future<Output = StoreResult<u64>> + Send {
        (**self).list_len(key)
    }

    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send {
        (**self).delete(key)
    }
}

/// Stores used to exercise failure paths in unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::{KvStore, StoreError, StoreResult};

    /// Every call fails as if the server were unreachable.
    pub(crate) struct OfflineStore;

    impl KvStore for OfflineStore {
        async fn hash_get_all(&self, _key: &str) -> StoreResult<HashMap<String, String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn hash_set(&self, _key: &str, _fields: &[(String, String)]) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn sorted_add(&self, _key: &str, _member: &str, _score: f64) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn sorted_members(&self, _key: &str) -> StoreResult<Vec<String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn list_push(&self, _key: &str, _value: String) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn list_range(&self, _key: &str) -> StoreResult<Vec<String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn list_len(&self, _key: &str) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Every call hangs forever.
    pub(crate) struct StalledStore;

    impl KvStore for StalledStore {
        async fn hash_get_all(&self, _key: &str) -> StoreResult<HashMap<String, String>> {
            std::future::pending().await
        }

        async fn hash_set(&self, _key: &str, _fields: &[(String, String)]) -> StoreResult<()> {
            std::future::pending().await
        }

        async fn sorted_add(&self, _key: &str, _member: &str, _score: f64) -> StoreResult<bool> {
            std::future::pending().await
        }

        async fn sorted_members(&self, _key: &str) -> StoreResult<Vec<String>> {
            std::future::pending().await
        }

        async fn list_push(&self, _key: &str, _value: String) -> StoreResult<u64> {
            std::future::pending().await
        }

        async fn list_range(&self, _key: &str) -> StoreResult<Vec<String>> {
            std::future::pending().await
        }

        async fn list_len(&self, _key: &str) -> StoreResult<u64> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> StoreResult<bool> {
            std::future::pending().await
        }
    }
}
