//! In-memory key-value store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::KeyValueStore;
use crate::error::Result;

/// Process-lifetime store backed by a `HashMap`
///
/// Used in tests, and wherever persistence across restarts is not wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.entries.write().remove(name).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read();
        Ok(entries
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_retrieve_delete() {
        let store = MemoryStore::new();

        store.set("test-key", "test-value").await.unwrap();
        assert_eq!(
            store.get("test-key").await.unwrap().as_deref(),
            Some("test-value")
        );

        assert!(store.delete("test-key").await.unwrap());
        assert!(store.get("test-key").await.unwrap().is_none());
        assert!(!store.delete("test-key").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let store = MemoryStore::new();

        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let store = MemoryStore::new();
        store.set("conversationKey_a_b", "[]").await.unwrap();
        store.set("conversationKey_a_c", "[]").await.unwrap();
        store.set("theme", "dark").await.unwrap();

        let mut keys = store.keys_with_prefix("conversationKey_").await.unwrap();
        keys.sort();

        assert_eq!(keys, vec!["conversationKey_a_b", "conversationKey_a_c"]);
        assert!(store.keys_with_prefix("nothing").await.unwrap().is_empty());
    }
}
