#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-store** – Object-store-like key/value persistence abstraction.
//!
//! spec.md treats the on-disk storage engine as an external collaborator and
//! requires only "an object-store-like key/value persistence API" from it
//! (§1 Out of scope). This crate defines that API as [`ObjectStore`] and
//! ships [`InMemoryStore`], a reference implementation good enough for tests
//! and for callers that don't need durability across process restarts.
//!
//! The shape mirrors `toka-store-core`'s `StorageBackend` trait (commit /
//! fetch by key) simplified to plain JSON documents, since the checkpoint and
//! memory-entry artifacts this crate persists are already JSON-shaped
//! (§6 External interfaces).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Errors that can occur during a store operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    /// The underlying backend failed to serve the request.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// The stored document could not be parsed back into the expected shape.
    #[error("corrupted document at key {key}: {reason}")]
    Corrupted {
        /// Key of the corrupted document.
        key: String,
        /// Why it failed to parse.
        reason: String,
    },
}

/// An object-store-like key/value persistence API.
///
/// Implementations need only guarantee that a successful `put` is visible to
/// a subsequent `get` for the same key on the same backend instance; the core
/// does not rely on cross-instance replication or transactional semantics
/// beyond per-key atomicity.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `value` under `key`, overwriting any existing document.
    async fn put(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Read the document stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Delete the document stored under `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// List all keys whose name starts with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// An in-memory, non-persistent object store.
///
/// Mirrors `toka-store-memory::MemoryBackend`: all documents live in a
/// `HashMap` guarded by a single async `RwLock` and are lost when the process
/// exits. Useful as the default backend in tests and as the fallback when a
/// session's `persistToDisk` is `false`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of stored documents. Useful in tests.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store currently holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Remove every document. Useful in tests.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        debug!(key, "storing document in memory store");
        self.documents.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let removed = self.documents.write().await.remove(key).is_some();
        if !removed {
            warn!(key, "delete requested for missing key");
        }
        Ok(removed)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .documents
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        store
            .put("session:s1", serde_json::json!({"status": "active"}))
            .await
            .unwrap();

        let value = store.get("session:s1").await.unwrap().unwrap();
        assert_eq!(value["status"], "active");
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = InMemoryStore::new();
        store.put("k", serde_json::json!(1)).await.unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let store = InMemoryStore::new();
        store.put("session:s1", serde_json::json!(1)).await.unwrap();
        store.put("session:s2", serde_json::json!(1)).await.unwrap();
        store.put("memory:m1", serde_json::json!(1)).await.unwrap();

        let mut keys = store.list_keys("session:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["session:s1".to_string(), "session:s2".to_string()]);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = InMemoryStore::new();
        store.put("a", serde_json::json!(1)).await.unwrap();
        assert_eq!(store.len().await, 1);
        store.clear().await;
        assert!(store.is_empty().await);
    }
}
