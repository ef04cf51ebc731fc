//! In-process backing store
//!
//! Mirrors the subset of Redis semantics the repository relies on, including
//! `WRONGTYPE` failures when a key is used as the wrong kind of value.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use super::error::{StoreError, StoreResult};
use super::KvStore;

#[derive(Debug, Clone)]
enum Value {
    Hash(BTreeMap<String, String>),
    SortedSet(Vec<(f64, String)>),
    List(Vec<String>),
}

/// Backing store held entirely in memory
///
/// Every operation takes the store-wide lock once, which makes each call
/// atomic with respect to the others.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub async fn key_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

impl KvStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(fields)) => Ok(fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let value = entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(BTreeMap::new()));

        match value {
            Value::Hash(hash) => {
                for (field, v) in fields {
                    hash.insert(field.clone(), v.clone());
                }
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        let value = entries
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(Vec::new()));

        let Value::SortedSet(set) = value else {
            return Err(wrong_type(key));
        };

        let existing = set.iter().position(|(_, m)| m == member);
        let added = existing.is_none();
        if let Some(pos) = existing {
            set.remove(pos);
        }
        set.push((score, member.to_string()));
        set.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        Ok(added)
    }

    async fn sorted_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::SortedSet(set)) => Ok(set.iter().map(|(_, m)| m.clone()).collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_push(&self, key: &str, value: String) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));

        match entry {
            Value::List(list) => {
                list.push(value);
                Ok(list.len() as u64)
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(list.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}
