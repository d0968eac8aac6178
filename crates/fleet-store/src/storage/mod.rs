//! Document storage abstraction and implementations
//!
//! Keys are relative, `/`-separated paths such as `teams/alpha/tasks.json`.
//! Both implementations create parent "directories" on demand.

mod local;
mod lock;
mod memory;

pub use local::LocalDocumentStore;
pub use lock::ResourceLock;
pub use memory::MemoryDocumentStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document key: {0}")]
    InvalidKey(String),

    #[error("Storage path not available")]
    PathUnavailable,
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Repository interface over named documents and logs.
///
/// Every coordination command goes through this trait, so tests can swap the
/// filesystem for [`MemoryDocumentStore`] without touching business logic.
pub trait DocumentStore: Send + Sync {
    /// Read a document. `Ok(None)` when it does not exist.
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace a document atomically. Readers see the old or the new content, never a mix.
    fn write_atomic(&self, key: &str, content: &str) -> StoreResult<()>;

    /// Append one line to a log. A trailing newline is added.
    fn append_line(&self, key: &str, line: &str) -> StoreResult<()>;

    /// Remove a document. Returns whether it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Whether a document exists.
    fn exists(&self, key: &str) -> bool;

    /// Names of entries directly under `dir` (files and subdirectories), sorted.
    fn list(&self, dir: &str) -> StoreResult<Vec<String>>;

    /// Last modification time of a document, if known.
    fn modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>>;

    /// Move every key under `from` to the same relative key under `to`.
    fn rename_dir(&self, from: &str, to: &str) -> StoreResult<()>;

    /// Remove every key under `dir`.
    fn remove_dir(&self, dir: &str) -> StoreResult<()>;

    /// Acquire the blocking advisory lock for `resource`. Released on drop.
    fn lock(&self, resource: &str) -> StoreResult<ResourceLock>;

    /// Filesystem root, for stores that have one.
    fn root(&self) -> Option<&Path> {
        None
    }
}

/// Typed helpers layered over any [`DocumentStore`].
pub trait StoreExt: DocumentStore {
    /// Load a JSON document, degrading to `T::default()` when it is missing or corrupt.
    fn load_json<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.try_load_json(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Unreadable document {}, using default: {}", key, e);
                T::default()
            }
        }
    }

    /// Load a JSON document, surfacing parse failures.
    fn try_load_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.read(key)? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    /// Serialize and atomically replace a JSON document.
    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(value)?;
        self.write_atomic(key, &content)
    }

    /// Append one JSON row to a line-delimited log.
    fn append_json<T: Serialize + ?Sized>(&self, key: &str, row: &T) -> StoreResult<()> {
        let line = serde_json::to_string(row)?;
        self.append_line(key, &line)
    }

    /// Non-empty lines of a log. A missing log has no lines.
    fn read_lines(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .read(key)?
            .map(|content| {
                content
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Parse every row of a log, skipping lines that do not parse.
    fn read_jsonl<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let lines = match self.read_lines(key) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Unreadable log {}: {}", key, e);
                return Vec::new();
            }
        };

        lines
            .iter()
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!("Skipping corrupt row in {}: {}", key, e);
                    None
                }
            })
            .collect()
    }

    /// Replace a log with the given rows.
    fn rewrite_lines(&self, key: &str, lines: &[String]) -> StoreResult<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        self.write_atomic(key, &content)
    }

    /// Run `f` while holding the lock for `resource`.
    fn with_lock<R, E, F>(&self, resource: &str, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce() -> Result<R, E>,
    {
        let _guard = self.lock(resource)?;
        f()
    }
}

impl<S: DocumentStore + ?Sized> StoreExt for S {}

/// Reject absolute keys and keys that escape the store root.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
