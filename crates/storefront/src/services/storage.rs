//! Device-local key/value storage.
//!
//! Everything a browser keeps for itself (the cart and the active-role
//! preference) goes through [`DeviceStorage`]. In production the backing
//! store is the visitor's session; tests use [`MemoryStorage`].
//!
//! Writes are last-writer-wins. Two tabs sharing a session are not
//! reconciled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tower_sessions::Session;

/// Storage backend failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
}

/// Key/value persistence port for device-local state.
pub trait DeviceStorage: Send + Sync + 'static {
    /// Read a value.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StorageError>> + Send;

    /// Write a value, replacing whatever was there.
    fn store(&self, key: &str, value: Value)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// [`DeviceStorage`] backed by the visitor's session.
#[derive(Clone, Debug)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl DeviceStorage for SessionStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.session.get::<Value>(key).await?)
    }

    async fn store(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.session.insert(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.session.remove::<Value>(key).await?;
        Ok(())
    }
}

/// In-memory [`DeviceStorage`].
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// was written.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a key.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().await.get(key).cloned()
    }

    /// Seed a value directly.
    pub async fn put(&self, key: &str, value: Value) {
        self.values.lock().await.insert(key.to_owned(), value);
    }
}

impl DeviceStorage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.get(key).await)
    }

    async fn store(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.put(key, value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.load("k").await.ok().flatten().is_none());

        storage.store("k", json!({"a": 1})).await.ok();
        assert_eq!(storage.load("k").await.ok().flatten(), Some(json!({"a": 1})));

        storage.remove("k").await.ok();
        assert!(storage.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_storage_clones_share_state() {
        let storage = MemoryStorage::new();
        let handle = storage.clone();
        storage.store("cart", json!([])).await.ok();
        assert_eq!(handle.get("cart").await, Some(json!([])));
    }
}
