//! # Conversation Key Store
//!
//! Produces the symmetric key for a conversation, caching it in memory for
//! the life of the process and in the local key-value store across restarts.
//!
//! ## Lookup Order
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ensure_key(conversation_id)                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. In-memory cache hit?  ──yes──►  return handle (no I/O)             │
//! │         │ no                                                           │
//! │         ▼                                                               │
//! │  2. "conversationKey_<id>" in local store?                             │
//! │         │ yes ──► parse JSON byte array ──► cache ──► return           │
//! │         │ no                                                           │
//! │         ▼                                                               │
//! │  3. SHA-256(id + "_shared_secret_key") ──► cache                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  4. Persist raw bytes as JSON array ──► return                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two first uses of a new conversation racing each other may both derive
//! and persist. Derivation is deterministic, so both write the same bytes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::crypto::{compute_key_fingerprint, derive_conversation_key, EncryptionKey};
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

/// Default prefix for persisted conversation key entries
pub const DEFAULT_KEY_PREFIX: &str = "conversationKey_";

/// Opaque reference to a conversation key
///
/// Only the codec can reach the key bytes. Callers can compare handles and
/// read a loggable fingerprint.
#[derive(Clone)]
pub struct KeyHandle {
    key: Arc<EncryptionKey>,
}

impl KeyHandle {
    fn new(key: EncryptionKey) -> Self {
        Self { key: Arc::new(key) }
    }

    pub(crate) fn key(&self) -> &EncryptionKey {
        &self.key
    }

    /// Short hex fingerprint of the key, safe to log
    pub fn fingerprint(&self) -> String {
        compute_key_fingerprint(&self.key)
    }
}

impl PartialEq for KeyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for KeyHandle {}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Derives, caches and persists one key per conversation
///
/// Cloning is cheap; clones share the cache and the backing store.
#[derive(Clone)]
pub struct ConversationKeyStore {
    cache: Arc<RwLock<HashMap<String, KeyHandle>>>,
    store: Arc<dyn KeyValueStore>,
    prefix: Arc<str>,
}

impl ConversationKeyStore {
    /// Create a key store over `store` using the default entry prefix
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    /// Create a key store whose persisted entries are named `<prefix><id>`
    pub fn with_prefix(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            store,
            prefix: Arc::from(prefix),
        }
    }

    /// Name of the local-store entry holding a conversation's key
    pub fn storage_key_for(&self, conversation_id: &str) -> String {
        format!("{}{}", self.prefix, conversation_id)
    }

    /// Number of keys held in memory
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Return the key for `conversation_id`, deriving it on first use
    ///
    /// ## Errors
    ///
    /// Every failure propagates: an empty id, an unreadable store, a
    /// persisted entry that is not a 32-byte JSON array, or a failed write
    /// of a freshly derived key.
    pub async fn ensure_key(&self, conversation_id: &str) -> Result<KeyHandle> {
        if conversation_id.is_empty() {
            return Err(Error::InvalidConversationId(
                "conversation id must not be empty".into(),
            ));
        }

        let cached = self.cache.read().get(conversation_id).cloned();
        if let Some(handle) = cached {
            return Ok(handle);
        }

        let name = self.storage_key_for(conversation_id);

        if let Some(raw) = self.store.get(&name).await? {
            let key = import_persisted(&name, &raw)?;
            let handle = self.cache_insert(conversation_id, KeyHandle::new(key));
            tracing::debug!(
                conversation_id,
                fingerprint = %handle.fingerprint(),
                "Loaded persisted conversation key"
            );
            return Ok(handle);
        }

        let handle = self.cache_insert(
            conversation_id,
            KeyHandle::new(derive_conversation_key(conversation_id)),
        );

        let exported = serde_json::to_string(handle.key().as_bytes())
            .map_err(|e| Error::KeyDerivationFailed(format!("key export failed: {}", e)))?;
        self.store.set(&name, &exported).await?;

        tracing::info!(
            conversation_id,
            fingerprint = %handle.fingerprint(),
            "Derived conversation key"
        );
        Ok(handle)
    }

    /// Forget every key, in memory and in the local store
    ///
    /// Removes all entries carrying this store's prefix, including ones this
    /// process never loaded. Idempotent.
    pub async fn clear_all(&self) -> Result<()> {
        let in_memory = {
            let mut cache = self.cache.write();
            let count = cache.len();
            cache.clear();
            count
        };

        let names = self.store.keys_with_prefix(&self.prefix).await?;
        for name in &names {
            self.store.delete(name).await?;
        }

        tracing::info!(
            in_memory,
            persisted = names.len(),
            "Cleared conversation keys"
        );
        Ok(())
    }

    /// Insert unless another task got there first; return the cached handle
    fn cache_insert(&self, conversation_id: &str, handle: KeyHandle) -> KeyHandle {
        self.cache
            .write()
            .entry(conversation_id.to_string())
            .or_insert(handle)
            .clone()
    }
}

impl fmt::Debug for ConversationKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationKeyStore")
            .field("prefix", &self.prefix)
            .field("cached", &self.cached_count())
            .finish()
    }
}

/// Parse a persisted `[n, n, ...]` entry back into a key
fn import_persisted(name: &str, raw: &str) -> Result<EncryptionKey> {
    let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
        serde_json::from_str(raw)
            .map_err(|e| Error::StorageCorrupted(format!("{}: {}", name, e)))?,
    );

    EncryptionKey::from_slice(&bytes)
        .map_err(|e| Error::StorageCorrupted(format!("{}: {}", name, e)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn key_store() -> (Arc<MemoryStore>, ConversationKeyStore) {
        let backing = Arc::new(MemoryStore::new());
        let keys = ConversationKeyStore::new(backing.clone());
        (backing, keys)
    }

    #[tokio::test]
    async fn test_first_use_derives_and_persists() {
        let (backing, keys) = key_store();

        let handle = keys.ensure_key("alice_bob").await.unwrap();
        assert_eq!(handle.fingerprint(), "59e780108893f32e");
        assert_eq!(keys.cached_count(), 1);

        let raw = backing
            .get("conversationKey_alice_bob")
            .await
            .unwrap()
            .unwrap();
        let persisted: Vec<u8> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 32);
        assert_eq!(&persisted[..], &handle.key().as_bytes()[..]);
    }

    #[tokio::test]
    async fn test_cache_hit_returns_same_handle() {
        let (_, keys) = key_store();

        let first = keys.ensure_key("alice_bob").await.unwrap();
        let second = keys.ensure_key("alice_bob").await.unwrap();

        assert!(Arc::ptr_eq(&first.key, &second.key));
    }

    #[tokio::test]
    async fn test_persisted_key_is_used() {
        let (backing, keys) = key_store();

        // A key that does not match the derivation proves the store was read.
        let planted: Vec<u8> = (0u8..32).collect();
        backing
            .set(
                "conversationKey_alice_bob",
                &serde_json::to_string(&planted).unwrap(),
            )
            .await
            .unwrap();

        let handle = keys.ensure_key("alice_bob").await.unwrap();
        assert_eq!(&handle.key().as_bytes()[..], &planted[..]);
    }

    #[tokio::test]
    async fn test_corrupted_entry_fails_loudly() {
        let (backing, keys) = key_store();

        backing
            .set("conversationKey_short", "[1,2,3]")
            .await
            .unwrap();
        backing
            .set("conversationKey_garbage", "not json")
            .await
            .unwrap();
        backing
            .set("conversationKey_overflow", &format!("[{}]", ["256"; 32].join(",")))
            .await
            .unwrap();

        for id in ["short", "garbage", "overflow"] {
            let err = keys.ensure_key(id).await.unwrap_err();
            assert!(matches!(err, Error::StorageCorrupted(_)), "{}: {:?}", id, err);
        }
        assert_eq!(keys.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let (backing, keys) = key_store();

        let err = keys.ensure_key("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidConversationId(_)));
        assert!(backing.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_removes_prefixed_entries_only() {
        let (backing, keys) = key_store();

        keys.ensure_key("alice_bob").await.unwrap();
        keys.ensure_key("alice_carol").await.unwrap();
        backing.set("conversationKey_stale", "[0]").await.unwrap();
        backing.set("unrelated", "keep me").await.unwrap();

        keys.clear_all().await.unwrap();

        assert_eq!(keys.cached_count(), 0);
        assert!(backing
            .keys_with_prefix(DEFAULT_KEY_PREFIX)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            backing.get("unrelated").await.unwrap().as_deref(),
            Some("keep me")
        );

        // Idempotent
        keys.clear_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_rederived_key_matches_after_clear() {
        let (_, keys) = key_store();

        let before = keys.ensure_key("alice_bob").await.unwrap();
        keys.clear_all().await.unwrap();
        let after = keys.ensure_key("alice_bob").await.unwrap();

        assert_eq!(before, after);
        assert!(!Arc::ptr_eq(&before.key, &after.key));
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let backing = Arc::new(MemoryStore::new());
        let keys = ConversationKeyStore::with_prefix(backing.clone(), "dm.");

        keys.ensure_key("a_b").await.unwrap();

        assert_eq!(keys.storage_key_for("a_b"), "dm.a_b");
        assert!(backing.get("dm.a_b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_agrees() {
        let (backing, keys) = key_store();

        let (a, b) = tokio::join!(keys.ensure_key("alice_bob"), keys.ensure_key("alice_bob"));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(backing.len(), 1);
    }

    #[test]
    fn test_handle_debug_hides_key() {
        let handle = KeyHandle::new(EncryptionKey::from_bytes([1u8; 32]));
        let printed = format!("{:?}", handle);
        assert!(printed.contains("fingerprint"));
        assert!(!printed.contains("[1, 1"));
    }
}
