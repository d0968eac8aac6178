//! Local filesystem document storage
//!
//! Documents are plain files under a base directory (`~/.fleet` by default).

use super::{DocumentStore, ResourceLock, StoreError, StoreResult, validate_key};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed document store
pub struct LocalDocumentStore {
    /// Base directory for all documents
    base_path: PathBuf,
}

impl LocalDocumentStore {
    /// Create storage with the default path (~/.fleet)
    pub fn new() -> StoreResult<Self> {
        let base_path = dirs::home_dir()
            .ok_or(StoreError::PathUnavailable)?
            .join(".fleet");

        Ok(Self { base_path })
    }

    /// Create storage with a custom base path
    pub fn with_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn ensure_parent(path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DocumentStore for LocalDocumentStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, key: &str, content: &str) -> StoreResult<()> {
        let path = self.path(key)?;
        Self::ensure_parent(&path)?;

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!(
            ".tmp-{}-{}-{}",
            std::process::id(),
            file_name,
            seq
        ));

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_data()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        debug!("Wrote {} ({} bytes)", key, content.len());
        Ok(())
    }

    fn append_line(&self, key: &str, line: &str) -> StoreResult<()> {
        let path = self.path(key)?;
        Self::ensure_parent(&path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(format!("{}\n", line).as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let path = self.path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.path(key).map(|p| p.exists()).unwrap_or(false)
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        let path = self.path(dir)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            // In-flight atomic writes
            if name.starts_with(".tmp-") {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let path = self.path(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn rename_dir(&self, from: &str, to: &str) -> StoreResult<()> {
        let source = self.path(from)?;
        let target = self.path(to)?;
        Self::ensure_parent(&target)?;
        fs::rename(&source, &target)?;
        debug!("Moved {} to {}", from, to);
        Ok(())
    }

    fn remove_dir(&self, dir: &str) -> StoreResult<()> {
        let path = self.path(dir)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn lock(&self, resource: &str) -> StoreResult<ResourceLock> {
        let path = self.path(resource)?;
        Self::ensure_parent(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(ResourceLock::file(file))
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreExt;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalDocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::with_path(dir.path());
        (dir, store)
    }

    #[test]
    fn test_write_and_read_creates_directories() {
        let (dir, store) = store();
        store
            .write_atomic("teams/alpha/config.json", "{\"a\":1}")
            .unwrap();

        assert!(dir.path().join("teams/alpha/config.json").exists());
        assert_eq!(
            store.read("teams/alpha/config.json").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(store.read("teams/alpha/missing.json").unwrap(), None);
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let (_dir, store) = store();
        for i in 0..10 {
            store
                .write_atomic("teams/alpha/runtime.json", &i.to_string())
                .unwrap();
        }
        assert_eq!(store.list("teams/alpha").unwrap(), vec!["runtime.json"]);
        assert_eq!(
            store.read("teams/alpha/runtime.json").unwrap().as_deref(),
            Some("9")
        );
    }

    #[test]
    fn test_remove_and_list() {
        let (_dir, store) = store();
        store.write_atomic("claims/T1.json", "{}").unwrap();
        store.write_atomic("claims/T2.json", "{}").unwrap();

        assert_eq!(store.list("claims").unwrap(), vec!["T1.json", "T2.json"]);
        assert!(store.remove("claims/T1.json").unwrap());
        assert!(!store.remove("claims/T1.json").unwrap());
        assert_eq!(store.list("claims").unwrap(), vec!["T2.json"]);
        assert!(store.list("nothing-here").unwrap().is_empty());
    }

    #[test]
    fn test_rename_dir() {
        let (_dir, store) = store();
        store.write_atomic("teams/alpha/tasks.json", "{}").unwrap();
        store
            .rename_dir("teams/alpha", "archive/alpha-20240101T000000Z")
            .unwrap();

        assert!(!store.exists("teams/alpha/tasks.json"));
        assert!(store.exists("archive/alpha-20240101T000000Z/tasks.json"));
    }

    #[test]
    fn test_lock_serializes_read_modify_write() {
        let (_dir, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..10 {
                        store
                            .with_lock::<_, StoreError, _>("teams/alpha/.runtime.lock", || {
                                let current: u64 = store
                                    .read("teams/alpha/counter")?
                                    .and_then(|s| s.parse().ok())
                                    .unwrap_or(0);
                                store.write_atomic("teams/alpha/counter", &(current + 1).to_string())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.read("teams/alpha/counter").unwrap().as_deref(),
            Some("80")
        );
    }
}
