// Secondary storage — the optional fast KV store (Redis-class) used to cache
// session payloads so the hot session-resolution path can skip the primary
// database. The store handles its own internal concurrency; callers only see
// get/set-with-TTL/delete.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Error string returned by secondary storage operations. Failures here are
/// degradations, not request failures — callers fall back to the primary
/// store.
pub type StorageResult = Result<(), String>;

#[async_trait]
pub trait SecondaryStorage: Send + Sync {
    /// Get a value by key. `None` for missing or expired keys.
    async fn get(&self, key: &str) -> Option<String>;

    /// Set a value with a TTL in seconds.
    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> StorageResult;

    /// Delete a key.
    async fn delete(&self, key: &str) -> StorageResult;
}

/// In-memory secondary storage used in tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemorySecondaryStorage {
    entries: Arc<RwLock<HashMap<String, (String, i64)>>>,
}

impl MemorySecondaryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl SecondaryStorage for MemorySecondaryStorage {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let (value, expires_at_ms) = entries.get(key)?;
        if *expires_at_ms <= Self::now_ms() {
            return None;
        }
        Some(value.clone())
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: i64) -> StorageResult {
        let expires_at_ms = Self::now_ms() + ttl_seconds * 1000;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at_ms));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let storage = MemorySecondaryStorage::new();
        storage.set("k", "v", 60).await.unwrap();
        assert_eq!(storage.get("k").await.as_deref(), Some("v"));
        storage.delete("k").await.unwrap();
        assert!(storage.get("k").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_missing() {
        let storage = MemorySecondaryStorage::new();
        storage.set("k", "v", -1).await.unwrap();
        assert!(storage.get("k").await.is_none());
    }
}
