//! # Encryption Module
//!
//! AES-256-GCM encryption of message bodies under a conversation key.
//!
//! ## Encryption Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MESSAGE ENCRYPTION FLOW                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SENDER                                                                │
//! │  ─────────────────────────────────────────────────────────────────      │
//! │                                                                         │
//! │  Step 1: Conversation key (from ConversationKeyStore)                  │
//! │  Step 2: Fresh 12-byte nonce from the OS RNG                           │
//! │  Step 3: AES-256-GCM-Encrypt(key, nonce, utf8(plaintext))              │
//! │           ↓                                                            │
//! │          ciphertext || 16-byte tag   (one opaque blob)                 │
//! │                                                                         │
//! │  RECIPIENT                                                             │
//! │  ─────────────────────────────────────────────────────────────────      │
//! │                                                                         │
//! │  Step 1: Same conversation key (re-derived or loaded)                  │
//! │  Step 2: AES-256-GCM-Decrypt(key, nonce, blob)                         │
//! │           ↓                                                            │
//! │          plaintext bytes, or Error if the tag does not verify          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No additional authenticated data is bound into the tag.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// ## Critical Security Requirement
///
/// **NEVER reuse a nonce with the same key!**
///
/// Every call to [`encrypt`] draws a fresh random nonce. Random 96-bit
/// nonces are safe for up to 2^32 messages per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| Error::EncryptionFailed(format!("Nonce generation failed: {}", e)))?;
        Ok(Self(bytes))
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| Error::InvalidNonce {
            expected: NONCE_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM encryption key
///
/// Zeroized when dropped. `Debug` never prints the key bytes.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Import raw key material of unknown length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "expected {} bytes of key material, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Export the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for EncryptionKey {}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionKey").field(&"<redacted>").finish()
    }
}

/// Encrypt bytes using AES-256-GCM with a fresh random nonce
///
/// ## Returns
///
/// Tuple of (nonce, ciphertext_with_tag)
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random()?;
    let ciphertext = encrypt_with_nonce(key, &nonce, plaintext)?;
    Ok((nonce, ciphertext))
}

/// Encrypt bytes with a caller-provided nonce
///
/// Only for deterministic tests and known-answer checks; production paths
/// go through [`encrypt`].
pub fn encrypt_with_nonce(key: &EncryptionKey, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    cipher
        .encrypt(AesNonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))
}

/// Decrypt bytes using AES-256-GCM
///
/// ## Errors
///
/// Returns `DecryptionFailed` if:
/// - The ciphertext was tampered with
/// - The key is wrong
/// - The nonce is wrong
pub fn decrypt(key: &EncryptionKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), ciphertext)
        .map_err(|_| {
            Error::DecryptionFailed("Decryption failed: authentication tag mismatch".into())
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let plaintext = b"Hello, World!";

        let (nonce, ciphertext) = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (nonce, ciphertext) = encrypt(&key, b"").unwrap();
        assert_eq!(ciphertext.len(), TAG_SIZE);

        let decrypted = decrypt(&key, &nonce, &ciphertext).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let key = EncryptionKey::from_bytes([7u8; 32]);
        let (_, ciphertext) = encrypt(&key, b"four").unwrap();
        assert_eq!(ciphertext.len(), 4 + TAG_SIZE);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (nonce, mut ciphertext) = encrypt(&key, b"Hello, World!").unwrap();
        ciphertext[0] ^= 0xFF;

        let result = decrypt(&key, &nonce, &ciphertext);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = EncryptionKey::from_bytes([42u8; 32]);

        let (nonce, ciphertext) = encrypt(&key, b"Hello, World!").unwrap();
        let mut other = *nonce.as_bytes();
        other[11] ^= 0x01;

        assert!(decrypt(&key, &Nonce::from_bytes(other), &ciphertext).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = EncryptionKey::from_bytes([42u8; 32]);
        let key2 = EncryptionKey::from_bytes([99u8; 32]);

        let (nonce, ciphertext) = encrypt(&key1, b"secret").unwrap();
        assert!(decrypt(&key2, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_different_nonces_produce_different_ciphertext() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let plaintext = b"Hello, World!";

        let (n1, ct1) = encrypt(&key, plaintext).unwrap();
        let (n2, ct2) = encrypt(&key, plaintext).unwrap();

        assert_ne!(n1, n2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_fixed_nonce_is_deterministic() {
        let key = EncryptionKey::from_bytes([1u8; 32]);
        let nonce = Nonce::from_bytes([9u8; NONCE_SIZE]);

        let a = encrypt_with_nonce(&key, &nonce, b"same input").unwrap();
        let b = encrypt_with_nonce(&key, &nonce, b"same input").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_slice_length_checks() {
        assert!(matches!(
            Nonce::from_slice(&[0u8; 11]),
            Err(Error::InvalidNonce {
                expected: 12,
                actual: 11
            })
        ));
        assert!(Nonce::from_slice(&[0u8; 12]).is_ok());

        assert!(matches!(
            EncryptionKey::from_slice(&[0u8; 16]),
            Err(Error::InvalidKey(_))
        ));
        assert!(EncryptionKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = EncryptionKey::from_bytes([0xAB; 32]);
        let printed = format!("{:?}", key);
        assert!(!printed.contains("171"));
        assert!(printed.contains("redacted"));
    }
}
