//! # Cryptography Module
//!
//! Primitives used by the conversation key store and the message codec.
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | SHA-256 | Conversation key derivation, key fingerprints |
//! | AES-256-GCM | Message body encryption (12-byte nonce, 16-byte tag) |
//! | OS RNG | One fresh nonce per encryption |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: [`EncryptionKey`] is zeroized when dropped
//! 2. **Secure Random**: nonces come from `rand::rngs::OsRng`
//! 3. **No Nonce Reuse**: every encryption draws a new nonce
//! 4. **Public Derivation**: conversation keys derive from the conversation
//!    id alone; see [`kdf`] for what that does and does not protect

pub mod encryption;
pub mod kdf;

pub use encryption::{
    decrypt, encrypt, encrypt_with_nonce, EncryptionKey, Nonce, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{compute_key_fingerprint, derive_conversation_key, SHARED_SECRET_SUFFIX};
