//! Shared helpers for fleet-core integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use fleet_core::error::{FleetError, FleetResult};
use fleet_core::lifecycle::{PaneInfo, ProcessHost};
use fleet_core::{Fleet, FleetConfig, ManualClock, NewTeam};
use fleet_store::{
    DocumentStore, LocalDocumentStore, MemoryDocumentStore, ResourceLock, StoreError, StoreResult,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Process host that keeps sessions in memory and records every call
#[derive(Default)]
pub struct RecordingHost {
    sessions: Mutex<BTreeMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    next_pane: Mutex<u32>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Make a pane vanish as if its process exited
    pub fn kill_externally(&self, pane_id: &str) {
        for panes in self.sessions.lock().values_mut() {
            panes.retain(|p| p != pane_id);
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn open_pane(&self, session: &str) -> FleetResult<PaneInfo> {
        let mut sessions = self.sessions.lock();
        let panes = sessions
            .get_mut(session)
            .ok_or_else(|| FleetError::host(format!("can't find session: {}", session)))?;
        let mut next = self.next_pane.lock();
        *next += 1;
        let pane_id = format!("%{}", *next);
        panes.push(pane_id.clone());
        Ok(PaneInfo {
            pane_id,
            tty: None,
        })
    }
}

impl ProcessHost for RecordingHost {
    fn has_session(&self, session: &str) -> bool {
        self.sessions.lock().contains_key(session)
    }

    fn create_session(&self, session: &str, _cwd: &Path) -> FleetResult<()> {
        self.record(format!("new-session {}", session));
        self.sessions.lock().entry(session.to_string()).or_default();
        Ok(())
    }

    fn kill_session(&self, session: &str) -> FleetResult<()> {
        self.record(format!("kill-session {}", session));
        self.sessions.lock().remove(session);
        Ok(())
    }

    fn split_pane(&self, session: &str, _cwd: &Path) -> FleetResult<PaneInfo> {
        self.record(format!("split-window {}", session));
        self.open_pane(session)
    }

    fn new_window(&self, session: &str, _cwd: &Path) -> FleetResult<PaneInfo> {
        self.record(format!("new-window {}", session));
        self.open_pane(session)
    }

    fn send_keys(&self, pane_id: &str, keys: &str, _enter: bool) -> FleetResult<()> {
        self.record(format!("send-keys {} {}", pane_id, keys));
        Ok(())
    }

    fn kill_pane(&self, pane_id: &str) -> FleetResult<()> {
        self.record(format!("kill-pane {}", pane_id));
        self.kill_externally(pane_id);
        Ok(())
    }

    fn list_panes(&self, session: &str) -> FleetResult<Vec<PaneInfo>> {
        Ok(self
            .sessions
            .lock()
            .get(session)
            .into_iter()
            .flatten()
            .map(|p| PaneInfo {
                pane_id: p.clone(),
                tty: None,
            })
            .collect())
    }

    fn select_pane(&self, pane_id: &str) -> FleetResult<()> {
        self.record(format!("select-pane {}", pane_id));
        Ok(())
    }

    fn interrupt_process(&self, pid: u32) -> FleetResult<()> {
        self.record(format!("kill -INT {}", pid));
        Ok(())
    }
}

/// Memory store whose atomic writes fail for keys ending in a chosen suffix
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryDocumentStore,
    failing_suffix: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn fail_writes_to(&self, suffix: &str) {
        *self.failing_suffix.lock() = Some(suffix.to_string());
    }

    pub fn heal(&self) {
        *self.failing_suffix.lock() = None;
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }
}

impl DocumentStore for FlakyStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.read(key)
    }

    fn write_atomic(&self, key: &str, content: &str) -> StoreResult<()> {
        if let Some(suffix) = self.failing_suffix.lock().as_deref() {
            if key.ends_with(suffix) {
                return Err(StoreError::Io(std::io::Error::other("no space left on device")));
            }
        }
        self.inner.write_atomic(key, content)
    }

    fn append_line(&self, key: &str, line: &str) -> StoreResult<()> {
        self.inner.append_line(key, line)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.inner.remove(key)
    }

    fn exists(&self, key: &str) -> bool {
        self.inner.exists(key)
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        self.inner.list(dir)
    }

    fn modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.modified(key)
    }

    fn rename_dir(&self, from: &str, to: &str) -> StoreResult<()> {
        self.inner.rename_dir(from, to)
    }

    fn remove_dir(&self, dir: &str) -> StoreResult<()> {
        self.inner.remove_dir(dir)
    }

    fn lock(&self, resource: &str) -> StoreResult<ResourceLock> {
        self.inner.lock(resource)
    }
}

pub struct Harness {
    pub fleet: Fleet,
    pub clock: Arc<ManualClock>,
    pub host: Arc<RecordingHost>,
}

fn harness(store: Arc<dyn DocumentStore>, config: FleetConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let host = Arc::new(RecordingHost::default());
    let fleet = Fleet::new(store, config)
        .with_clock(clock.clone())
        .with_host(host.clone())
        .with_workdir("/work");
    Harness { fleet, clock, host }
}

/// Engine over an in-memory store
pub fn memory_harness() -> Harness {
    harness(Arc::new(MemoryDocumentStore::new()), FleetConfig::default())
}

/// Engine over an in-memory store the test can also reach directly
pub fn shared_memory_harness() -> (Harness, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    (harness(store.clone(), FleetConfig::default()), store)
}

/// Engine over a store whose writes can be made to fail
pub fn flaky_harness() -> (Harness, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    (harness(store.clone(), FleetConfig::default()), store)
}

/// Engine over a real directory, for lock and file-layout tests
pub fn disk_harness(dir: &TempDir) -> Harness {
    harness(
        Arc::new(LocalDocumentStore::with_path(dir.path())),
        FleetConfig::default(),
    )
}

impl Harness {
    /// Create team `alpha` with lead `lead`
    pub fn create_alpha(&self) {
        self.fleet
            .create_team(NewTeam::new("alpha"))
            .expect("create team alpha");
    }
}
