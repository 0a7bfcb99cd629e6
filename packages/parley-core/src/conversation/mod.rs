//! # Conversation Encryption
//!
//! The direct-message encryption layer: a key store that yields one key per
//! conversation, and a codec that seals and opens message bodies with it.
//!
//! ```text
//! ┌──────────────────────┐        ensure_key        ┌──────────────────────┐
//! │     MessageCodec     │ ───────────────────────► │ ConversationKeyStore │
//! │                      │                          │                      │
//! │ - encrypt_message    │ ◄─────────────────────── │ - memory cache       │
//! │ - decrypt_message    │        KeyHandle         │ - KeyValueStore      │
//! └──────────────────────┘                          └──────────────────────┘
//! ```

mod codec;
mod keystore;

pub use codec::{
    placeholder_for, EncryptedPayload, MessageCodec, PLACEHOLDER_PREFIX,
    PLACEHOLDER_PREVIEW_CHARS,
};
pub use keystore::{ConversationKeyStore, KeyHandle, DEFAULT_KEY_PREFIX};
