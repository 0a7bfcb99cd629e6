//! # Error Handling
//!
//! Error types for the conversation key store, the message codec and the
//! messaging integration.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── KeyDerivationFailed   - Hash/import/export of a key failed    │
//! │  │   ├── EncryptionFailed      - AES-GCM seal failed                   │
//! │  │   ├── DecryptionFailed      - Tag mismatch, bad base64, bad UTF-8   │
//! │  │   ├── InvalidKey            - Key material has the wrong length     │
//! │  │   └── InvalidNonce          - Nonce has the wrong length            │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError      - Failed to read from the local store   │
//! │  │   ├── StorageWriteError     - Failed to write to the local store    │
//! │  │   └── StorageCorrupted      - Persisted entry can't be parsed       │
//! │  │                                                                      │
//! │  ├── Message Errors                                                    │
//! │  │   ├── InvalidConversationId - Empty participant/conversation id     │
//! │  │   └── SendFailed            - Codec refused to produce a payload    │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      └── SerializationError                                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The key store propagates every error. The codec converts errors at its
//! two boundaries into different shapes: `None` for a failed encryption and
//! a placeholder string for a failed decryption. See
//! [`crate::conversation::MessageCodec`].

use thiserror::Error;

/// Result type alias for parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for parley
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Key derivation, import or export failed
    #[error("Failed to derive conversation key: {0}")]
    KeyDerivationFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Nonce has the wrong length
    #[error("Invalid nonce: expected {expected} bytes, got {actual}")]
    InvalidNonce {
        /// Required nonce length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Data corruption detected
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    // ========================================================================
    // Message Errors (700-799)
    // ========================================================================

    /// Conversation or participant identifier is unusable
    #[error("Invalid conversation id: {0}")]
    InvalidConversationId(String),

    /// The message could not be encrypted and was not sent
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Numeric error code
    ///
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 700-799: Messages
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Crypto (300-399)
            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed(_) => 301,
            Error::InvalidKey(_) => 304,
            Error::KeyDerivationFailed(_) => 307,
            Error::InvalidNonce { .. } => 308,

            // Storage (400-499)
            Error::StorageReadError(_) => 401,
            Error::StorageWriteError(_) => 402,
            Error::StorageCorrupted(_) => 404,

            // Messages (700-799)
            Error::SendFailed(_) => 703,
            Error::InvalidConversationId(_) => 705,

            // Internal (900-999)
            Error::SerializationError(_) => 902,
        }
    }

    /// Check if this error is recoverable
    ///
    /// A failed send can be retried by resubmitting; storage I/O may succeed
    /// on a second attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SendFailed(_) | Error::StorageReadError(_) | Error::StorageWriteError(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
