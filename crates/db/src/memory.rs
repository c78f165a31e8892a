//! In-process [`KvStore`] used for local development and tests.

use std::collections::BTreeMap;

use admix_core::store::{KvStore, StoreError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// A [`KvStore`] backed by an ordered map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, record: serde_json::Value) -> Result<(), StoreError> {
        self.records.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("ad1:mixer", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("ad1:mixer").await.unwrap(), Some(json!({"a": 1})));

        assert!(store.delete("ad1:mixer").await.unwrap());
        assert!(!store.delete("ad1:mixer").await.unwrap());
        assert_eq!(store.get("ad1:mixer").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn list_keys_is_prefix_scoped_and_ordered() {
        let store = MemoryStore::new();
        for key in [
            "ad1:voices:version:b",
            "ad1:voices:version:a",
            "ad1:voices:active",
            "ad10:voices:version:c",
            "ad1:music:version:d",
        ] {
            store.set(key, json!(null)).await.unwrap();
        }

        let keys = store.list_keys("ad1:voices:version:").await.unwrap();
        assert_eq!(keys, vec!["ad1:voices:version:a", "ad1:voices:version:b"]);
        assert_eq!(store.len().await, 5);
    }
}
