//! In-memory document storage
//!
//! Same semantics as the filesystem store, used by unit tests.

use super::{DocumentStore, ResourceLock, StoreResult, validate_key};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Entry {
    content: String,
    modified: DateTime<Utc>,
}

/// Document store held entirely in memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<BTreeMap<String, Entry>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    /// Override a document's modification time
    pub fn set_modified(&self, key: &str, at: DateTime<Utc>) {
        if let Some(entry) = self.docs.lock().get_mut(key) {
            entry.modified = at;
        }
    }

    fn prefix(dir: &str) -> String {
        format!("{}/", dir.trim_end_matches('/'))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        Ok(self.docs.lock().get(key).map(|e| e.content.clone()))
    }

    fn write_atomic(&self, key: &str, content: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.docs.lock().insert(
            key.to_string(),
            Entry {
                content: content.to_string(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn append_line(&self, key: &str, line: &str) -> StoreResult<()> {
        validate_key(key)?;
        let mut docs = self.docs.lock();
        let entry = docs.entry(key.to_string()).or_insert_with(|| Entry {
            content: String::new(),
            modified: Utc::now(),
        });
        entry.content.push_str(line);
        entry.content.push('\n');
        entry.modified = Utc::now();
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        Ok(self.docs.lock().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> bool {
        let docs = self.docs.lock();
        if docs.contains_key(key) {
            return true;
        }
        let prefix = Self::prefix(key);
        docs.keys().any(|k| k.starts_with(&prefix))
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        validate_key(dir)?;
        let prefix = Self::prefix(dir);
        let names: BTreeSet<String> = self
            .docs
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    fn modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        validate_key(key)?;
        Ok(self.docs.lock().get(key).map(|e| e.modified))
    }

    fn rename_dir(&self, from: &str, to: &str) -> StoreResult<()> {
        validate_key(from)?;
        validate_key(to)?;
        let from_prefix = Self::prefix(from);
        let to_prefix = Self::prefix(to);

        let mut docs = self.docs.lock();
        let moved: Vec<String> = docs
            .keys()
            .filter(|k| k.starts_with(&from_prefix))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(IoError::new(ErrorKind::NotFound, from.to_string()).into());
        }
        for key in moved {
            if let Some(entry) = docs.remove(&key) {
                let rest = &key[from_prefix.len()..];
                docs.insert(format!("{}{}", to_prefix, rest), entry);
            }
        }
        Ok(())
    }

    fn remove_dir(&self, dir: &str) -> StoreResult<()> {
        validate_key(dir)?;
        let prefix = Self::prefix(dir);
        self.docs.lock().retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    fn lock(&self, resource: &str) -> StoreResult<ResourceLock> {
        validate_key(resource)?;
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(resource.to_string()).or_default())
        };
        Ok(ResourceLock::memory(mutex.lock_arc()))
    }
}
