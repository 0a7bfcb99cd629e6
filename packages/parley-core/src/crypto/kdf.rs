//! # Conversation Key Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 CONVERSATION ID → MESSAGE KEY                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  conversation_id          e.g. "alice_bob"                             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  utf8(conversation_id + "_shared_secret_key")                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  SHA-256  ──►  32-byte digest  ──►  raw AES-256-GCM key                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The derivation takes no secret input. Any party that knows (or can
//! reconstruct) the conversation id derives the same key, on any device,
//! without contacting the other participant. Existing ciphertexts depend on
//! this exact construction, so it must not change.
//!
//! The scheme has no forward secrecy and no rotation. It keeps message
//! bodies unreadable to someone browsing stored documents, not to someone
//! who can compute the same public function.

use sha2::{Digest, Sha256};

use super::encryption::{EncryptionKey, KEY_SIZE};

/// Suffix appended to the conversation id before hashing
pub const SHARED_SECRET_SUFFIX: &str = "_shared_secret_key";

/// Derive the AES-256-GCM key for a conversation
///
/// Deterministic: the same `conversation_id` always yields the same 32 bytes.
pub fn derive_conversation_key(conversation_id: &str) -> EncryptionKey {
    let mut hasher = Sha256::new();
    hasher.update(conversation_id.as_bytes());
    hasher.update(SHARED_SECRET_SUFFIX.as_bytes());

    let digest = hasher.finalize();
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest);

    EncryptionKey::from_bytes(key)
}

/// Short, non-reversible identifier for a key, safe to log
///
/// First 8 bytes of SHA-256 over the raw key, hex encoded.
pub fn compute_key_fingerprint(key: &EncryptionKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

// ============================================================================
// TESTS
// ============================================================================
