//! Advisory lock guards

use fs2::FileExt;
use parking_lot::RawMutex;
use parking_lot::lock_api::ArcMutexGuard;
use std::fs::File;
use tracing::warn;

/// Held lock on a resource key. Dropping it releases the lock.
pub struct ResourceLock {
    inner: LockInner,
}

enum LockInner {
    File(File),
    Memory(#[allow(dead_code)] ArcMutexGuard<RawMutex, ()>),
}

impl ResourceLock {
    pub(crate) fn file(file: File) -> Self {
        Self {
            inner: LockInner::File(file),
        }
    }

    pub(crate) fn memory(guard: ArcMutexGuard<RawMutex, ()>) -> Self {
        Self {
            inner: LockInner::Memory(guard),
        }
    }
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        if let LockInner::File(file) = &self.inner {
            if let Err(e) = FileExt::unlock(file) {
                warn!("Failed to release advisory lock: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            LockInner::File(_) => "file",
            LockInner::Memory(_) => "memory",
        };
        f.debug_struct("ResourceLock").field("kind", &kind).finish()
    }
}
