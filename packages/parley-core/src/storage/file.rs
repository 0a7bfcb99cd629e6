//! File-backed key-value store.
//!
//! All entries live in one JSON object file:
//!
//! ```text
//! {
//!   "conversationKey_alice_bob": "[95,165,210,...]",
//!   "conversationKey_alice_carol": "[18,7,...]"
//! }
//! ```
//!
//! The file is read on first access and rewritten in full after every
//! mutation (temp file, then rename).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// Per-device store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// `None` until the file has been loaded
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    /// Open a store at `path`
    ///
    /// Nothing is read until the first operation. A missing file is an
    /// empty store; it is created on the first write.
    ///
    /// Keep one instance per file and share it. Separate instances over the
    /// same path do not see each other's writes.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the entry map, reading the file on first use
    async fn loaded(&self) -> Result<MutexGuard<'_, Option<BTreeMap<String, String>>>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard)
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                Error::StorageCorrupted(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::StorageReadError(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let write_err = |e: std::io::Error| {
            Error::StorageWriteError(format!("{}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;

        tracing::trace!(path = %self.path.display(), entries = entries.len(), "Key store flushed");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let mut guard = self.loaded().await?;
        let entries = guard.get_or_insert_with(BTreeMap::new);
        Ok(entries.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let mut guard = self.loaded().await?;
        let entries = guard.get_or_insert_with(BTreeMap::new);
        entries.insert(name.to_string(), value.to_string());
        self.persist(entries).await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut guard = self.loaded().await?;
        let entries = guard.get_or_insert_with(BTreeMap::new);
        if entries.remove(name).is_none() {
            return Ok(false);
        }
        self.persist(entries).await?;
        Ok(true)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut guard = self.loaded().await?;
        let entries = guard.get_or_insert_with(BTreeMap::new);
        Ok(entries
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
