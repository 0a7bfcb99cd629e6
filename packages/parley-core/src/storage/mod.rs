//! # Storage Module
//!
//! Local, per-device key-value persistence for conversation keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        STORAGE ARCHITECTURE                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyValueStore Trait                                            │   │
//! │  │  ───────────────────                                             │   │
//! │  │                                                                 │   │
//! │  │  • get(name)               - Read one entry                     │   │
//! │  │  • set(name, value)        - Replace one entry                  │   │
//! │  │  • delete(name)            - Remove one entry                   │   │
//! │  │  • keys_with_prefix(p)     - Enumerate names starting with p    │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐              │
//! │  │  MemoryStore  │  │   FileStore   │  │  (your own)   │              │
//! │  │               │  │               │  │               │              │
//! │  │ - Process     │  │ - One JSON    │  │ - OS keychain │              │
//! │  │   lifetime    │  │   object file │  │ - Encrypted   │              │
//! │  │ - Tests       │  │ - Survives    │  │   at rest     │              │
//! │  │               │  │   restarts    │  │               │              │
//! │  └───────────────┘  └───────────────┘  └───────────────┘              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are plain strings. Neither bundled implementation encrypts at
//! rest: conversation keys are stored as a JSON array of byte values, exactly
//! as readable as a browser's `localStorage`.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// Local key-value persistence used by the conversation key store
///
/// Every write replaces a whole value, so implementations need no
/// cross-entry transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `name`
    async fn get(&self, name: &str) -> Result<Option<String>>;

    /// Store `value` under `name`, replacing any previous value
    async fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Remove `name`; returns whether an entry existed
    async fn delete(&self, name: &str) -> Result<bool>;

    /// All entry names that start with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}
