//! # Message Codec
//!
//! Encrypts and decrypts individual message bodies with the conversation
//! key from [`ConversationKeyStore`].
//!
//! ## Failure Behavior
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CODEC BOUNDARY FAILURE SHAPES                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  encrypt_message  ──► Some(EncryptedPayload)                           │
//! │                   └─► None           send flow aborts, nothing stored  │
//! │                                                                         │
//! │  decrypt_message  ──► plaintext                                        │
//! │                   └─► "[Encrypted: <first 20 chars>...]"               │
//! │                                      render flow shows a degraded body │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A message that cannot be encrypted must not be sent. A message that
//! cannot be decrypted is still shown. [`MessageCodec::try_encrypt`] and
//! [`MessageCodec::try_decrypt`] expose the underlying `Result` for callers
//! that want the error itself.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::keystore::ConversationKeyStore;
use crate::crypto::{decrypt, encrypt, Nonce};
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

/// Opening of the placeholder shown for an undecryptable body
pub const PLACEHOLDER_PREFIX: &str = "[Encrypted: ";

/// Number of ciphertext characters echoed in the placeholder
pub const PLACEHOLDER_PREVIEW_CHARS: usize = 20;

/// Encrypted body of one message
///
/// Field names match the stored message document (`encryptedContent`, `iv`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Base64 of AES-GCM ciphertext with the 16-byte tag appended
    pub encrypted_content: String,
    /// Base64 of the 12-byte nonce
    pub iv: String,
}

/// Placeholder rendered in place of a body that failed to decrypt
pub fn placeholder_for(encrypted_content: &str) -> String {
    let preview: String = encrypted_content
        .chars()
        .take(PLACEHOLDER_PREVIEW_CHARS)
        .collect();
    format!("{}{}...]", PLACEHOLDER_PREFIX, preview)
}

/// Per-conversation message body encryption
///
/// Stateless apart from the key cache it shares with its
/// [`ConversationKeyStore`]. Each call stands alone.
#[derive(Clone, Debug)]
pub struct MessageCodec {
    keys: ConversationKeyStore,
}

impl MessageCodec {
    /// Create a codec with a fresh key store over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key_store(ConversationKeyStore::new(store))
    }

    /// Create a codec sharing an existing key store
    pub fn with_key_store(keys: ConversationKeyStore) -> Self {
        Self { keys }
    }

    /// The key store backing this codec
    pub fn key_store(&self) -> &ConversationKeyStore {
        &self.keys
    }

    /// Make sure the conversation's key is ready before the first message
    ///
    /// Optional: encryption and decryption fetch the key themselves.
    pub async fn initialize_for_conversation(&self, conversation_id: &str) -> Result<()> {
        self.keys.ensure_key(conversation_id).await.map(|_| ())
    }

    /// Encrypt `plaintext`, propagating any failure
    pub async fn try_encrypt(
        &self,
        plaintext: &str,
        conversation_id: &str,
    ) -> Result<EncryptedPayload> {
        let handle = self.keys.ensure_key(conversation_id).await?;
        let (nonce, ciphertext) = encrypt(handle.key(), plaintext.as_bytes())?;

        Ok(EncryptedPayload {
            encrypted_content: BASE64.encode(&ciphertext),
            iv: BASE64.encode(nonce.as_bytes()),
        })
    }

    /// Encrypt `plaintext` for sending
    ///
    /// Returns `None` on any failure. The caller must then abort the send and
    /// report it; the error has already been logged here.
    pub async fn encrypt_message(
        &self,
        plaintext: &str,
        conversation_id: &str,
    ) -> Option<EncryptedPayload> {
        match self.try_encrypt(plaintext, conversation_id).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::error!(conversation_id, error = %e, "Message encryption failed");
                None
            }
        }
    }

    /// Decrypt a stored body, propagating any failure
    pub async fn try_decrypt(
        &self,
        encrypted_content: &str,
        iv: &str,
        conversation_id: &str,
    ) -> Result<String> {
        let handle = self.keys.ensure_key(conversation_id).await?;

        let ciphertext = BASE64
            .decode(encrypted_content)
            .map_err(|e| Error::DecryptionFailed(format!("Invalid ciphertext encoding: {}", e)))?;
        let nonce_bytes = BASE64
            .decode(iv)
            .map_err(|e| Error::DecryptionFailed(format!("Invalid nonce encoding: {}", e)))?;
        let nonce = Nonce::from_slice(&nonce_bytes)?;

        let plaintext = decrypt(handle.key(), &nonce, &ciphertext)?;

        String::from_utf8(plaintext)
            .map_err(|e| Error::DecryptionFailed(format!("Plaintext is not UTF-8: {}", e)))
    }

    /// Decrypt a stored body for display
    ///
    /// Never fails: a body that cannot be decrypted comes back as
    /// [`placeholder_for`]`(encrypted_content)`.
    pub async fn decrypt_message(
        &self,
        encrypted_content: &str,
        iv: &str,
        conversation_id: &str,
    ) -> String {
        match self.try_decrypt(encrypted_content, iv, conversation_id).await {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "Message decryption failed");
                placeholder_for(encrypted_content)
            }
        }
    }

    /// Forget all conversation keys (local logout)
    pub async fn clear_keys(&self) -> Result<()> {
        self.keys.clear_all().await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    fn codec() -> MessageCodec {
        MessageCodec::new(Arc::new(MemoryStore::new()))
    }

    /// Store whose every operation fails
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _name: &str) -> Result<Option<String>> {
            Err(Error::StorageReadError("unavailable".into()))
        }

        async fn set(&self, _name: &str, _value: &str) -> Result<()> {
            Err(Error::StorageWriteError("unavailable".into()))
        }

        async fn delete(&self, _name: &str) -> Result<bool> {
            Err(Error::StorageWriteError("unavailable".into()))
        }

        async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
            Err(Error::StorageReadError("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let codec = codec();

        let payload = codec.encrypt_message("hello 👋", "alice_bob").await.unwrap();
        let plaintext = codec
            .decrypt_message(&payload.encrypted_content, &payload.iv, "alice_bob")
            .await;

        assert_eq!(plaintext, "hello 👋");
    }

    #[tokio::test]
    async fn test_payload_shape() {
        let codec = codec();

        let payload = codec.try_encrypt("abc", "alice_bob").await.unwrap();
        let nonce = BASE64.decode(&payload.iv).unwrap();
        let blob = BASE64.decode(&payload.encrypted_content).unwrap();

        assert_eq!(nonce.len(), 12);
        assert_eq!(blob.len(), 3 + 16);
    }

    #[tokio::test]
    async fn test_known_ciphertext_decrypts() {
        // AES-256-GCM over "hello 👋" with the derived "alice_bob" key and
        // nonce 01..0c, produced independently of this crate.
        let codec = codec();

        let plaintext = codec
            .try_decrypt(
                "M+JPwM2KGl9uSiZTCR5UyAzqTcNm0oEP+LM=",
                "AQIDBAUGBwgJCgsM",
                "alice_bob",
            )
            .await
            .unwrap();

        assert_eq!(plaintext, "hello 👋");
    }

    #[tokio::test]
    async fn test_wrong_conversation_gives_placeholder() {
        let codec = codec();

        let payload = codec.encrypt_message("hello", "alice_bob").await.unwrap();
        let shown = codec
            .decrypt_message(&payload.encrypted_content, &payload.iv, "alice_carol")
            .await;

        assert!(shown.starts_with(PLACEHOLDER_PREFIX));
        assert_eq!(shown, placeholder_for(&payload.encrypted_content));
    }

    #[tokio::test]
    async fn test_malformed_inputs_give_placeholder() {
        let codec = codec();

        let payload = codec.encrypt_message("hello", "alice_bob").await.unwrap();

        let bad_base64 = codec.decrypt_message("%%%", &payload.iv, "alice_bob").await;
        assert_eq!(bad_base64, "[Encrypted: %%%...]");

        let short_nonce = codec
            .decrypt_message(&payload.encrypted_content, "AAAA", "alice_bob")
            .await;
        assert!(short_nonce.starts_with(PLACEHOLDER_PREFIX));

        let err = codec
            .try_decrypt(&payload.encrypted_content, "AAAA", "alice_bob")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidNonce { actual: 3, .. }));
    }

    #[tokio::test]
    async fn test_non_utf8_plaintext_gives_placeholder() {
        let codec = codec();
        let handle = codec.key_store().ensure_key("alice_bob").await.unwrap();

        let (nonce, ciphertext) = encrypt(handle.key(), &[0xff, 0xfe, 0xfd]).unwrap();
        let content = BASE64.encode(&ciphertext);

        let err = codec
            .try_decrypt(&content, &BASE64.encode(nonce.as_bytes()), "alice_bob")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[tokio::test]
    async fn test_failure_shapes_differ() {
        let codec = MessageCodec::new(Arc::new(BrokenStore));

        assert!(codec.encrypt_message("hello", "alice_bob").await.is_none());
        assert!(codec.initialize_for_conversation("alice_bob").await.is_err());

        let shown = codec
            .decrypt_message("QUJDREVGR0hJSktMTU5PUFFSU1RVVg==", "AQIDBAUGBwgJCgsM", "alice_bob")
            .await;
        assert_eq!(shown, "[Encrypted: QUJDREVGR0hJSktMTU5P...]");
    }

    #[tokio::test]
    async fn test_empty_conversation_id_fails_send() {
        let codec = codec();
        assert!(codec.encrypt_message("hello", "").await.is_none());
    }

    #[test]
    fn test_placeholder_truncates_by_chars() {
        assert_eq!(placeholder_for(""), "[Encrypted: ...]");
        assert_eq!(
            placeholder_for("abcdefghijklmnopqrstuvwxyz"),
            "[Encrypted: abcdefghijklmnopqrst...]"
        );
        // Never splits a multi-byte character
        let long = "é".repeat(30);
        assert_eq!(
            placeholder_for(&long),
            format!("[Encrypted: {}...]", "é".repeat(20))
        );
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let payload = EncryptedPayload {
            encrypted_content: "Y3Q=".into(),
            iv: "aXY=".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["encryptedContent"], "Y3Q=");
        assert_eq!(json["iv"], "aXY=");
    }
}
