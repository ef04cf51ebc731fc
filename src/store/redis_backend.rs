//! Redis backing store
//!
//! Hashes map to `HSET`/`HGETALL`, the catalog to `ZADD`/`ZRANGE` with equal
//! scores (Redis then orders members lexically), and point logs to
//! `RPUSH`/`LRANGE`. `RPUSH` is atomic on the server, so concurrent appends
//! never need a read-modify-write.

use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::error::{StoreError, StoreResult};
use super::KvStore;

/// Backing store on a Redis server
///
/// The connection manager reconnects on its own after a dropped connection;
/// it is cheap to clone, and each call works on its own clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the server at `url` (for example `redis://127.0.0.1/`)
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = client.get_connection_manager().await?;

        tracing::info!(url = %url, "Connected to redis");

        Ok(Self { conn })
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl KvStore for RedisStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.zadd(key, member, score).await?;
        Ok(added > 0)
    }

    async fn sorted_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrange(key, 0, -1).await?;
        Ok(members)
    }

    async fn list_push(&self, key: &str, value: String) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.rpush(key, value).await?;
        Ok(len)
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(values)
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(key).await?;
        Ok(len)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}
