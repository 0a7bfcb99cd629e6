//! # Parley Core
//!
//! End-to-end encryption of direct-message bodies: one symmetric key per
//! conversation, AES-256-GCM per message, and a small messaging layer that
//! stores only ciphertext.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PARLEY CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Messaging                                                       │  │
//! │  │  - conversation ids  - send / load / mark read  - repository     │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 │                                       │
//! │  ┌──────────────────────────────▼───────────────────────────────────┐  │
//! │  │  Conversation                                                    │  │
//! │  │  - MessageCodec (encrypt / decrypt)  - ConversationKeyStore      │  │
//! │  └───────────────┬──────────────────────────────────┬───────────────┘  │
//! │                  │                                  │                   │
//! │  ┌───────────────▼──────────────┐  ┌────────────────▼───────────────┐  │
//! │  │  Crypto                      │  │  Storage                       │  │
//! │  │  - SHA-256 key derivation    │  │  - KeyValueStore trait         │  │
//! │  │  - AES-256-GCM               │  │  - MemoryStore / FileStore     │  │
//! │  └──────────────────────────────┘  └────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Key derivation and authenticated encryption
//! - [`storage`] - Local key-value persistence
//! - [`conversation`] - Per-conversation keys and the message codec
//! - [`messaging`] - Message records, repositories and the send/load flow
//!
//! ## Security Model
//!
//! Conversation keys are a hash of the conversation id. Anyone who knows
//! both participants' ids can compute the key, so this protects bodies from
//! a storage backend that only sees documents, not from a party that knows
//! the id scheme. Keys are persisted unencrypted on the device.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use parley_core::{conversation_id, MemoryStore, MessageCodec};
//!
//! let codec = MessageCodec::new(Arc::new(MemoryStore::new()));
//! let conv = conversation_id("bob", "alice")?;
//! let payload = codec.encrypt_message("hello 👋", &conv).await.unwrap();
//! let body = codec.decrypt_message(&payload.encrypted_content, &payload.iv, &conv).await;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod conversation;
pub mod crypto;
pub mod error;
pub mod messaging;
pub mod storage;
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use conversation::{
    placeholder_for, ConversationKeyStore, EncryptedPayload, KeyHandle, MessageCodec,
    DEFAULT_KEY_PREFIX,
};
pub use error::{Error, Result};
pub use messaging::{
    conversation_id, DecryptedMessage, InMemoryRepository, MessageRecord, MessageRepository,
    MessageType, MessagingService, Participant,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

// ============================================================================
// CONFIGURATION
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Configuration for building a [`MessageCodec`]
///
/// Every codec built from one configuration, or from any of its clones,
/// shares a single [`ConversationKeyStore`] and backing store. The store is
/// opened when the first codec is built; later edits to `store_path` or
/// `key_prefix` do not reopen it.
#[derive(Clone)]
pub struct CoreConfig {
    /// JSON file for persisted keys (in-memory only if None)
    pub store_path: Option<PathBuf>,
    /// Prefix of persisted key entries
    pub key_prefix: String,
    keys: Arc<OnceCell<ConversationKeyStore>>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            keys: Arc::new(OnceCell::new()),
        }
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("store_path", &self.store_path)
            .field("key_prefix", &self.key_prefix)
            .field("opened", &self.keys.get().is_some())
            .finish()
    }
}

impl CoreConfig {
    /// Configuration persisting keys to `path`
    pub fn with_store_path(path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// The shared key store, opened on first call
    pub fn key_store(&self) -> ConversationKeyStore {
        self.keys
            .get_or_init(|| {
                tracing::debug!(
                    store = ?self.store_path,
                    prefix = %self.key_prefix,
                    "Opening conversation key store"
                );
                ConversationKeyStore::with_prefix(self.open_store(), self.key_prefix.clone())
            })
            .clone()
    }

    /// Build a codec over the shared key store
    pub fn build_codec(&self) -> MessageCodec {
        MessageCodec::with_key_store(self.key_store())
    }

    fn open_store(&self) -> Arc<dyn KeyValueStore> {
        match &self.store_path {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        }
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Parley Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
