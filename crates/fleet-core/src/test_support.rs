//! In-crate fixtures: memory store, manual clock and a scripted host

use crate::clock::ManualClock;
use crate::config::FleetConfig;
use crate::error::{FleetError, FleetResult};
use crate::fleet::Fleet;
use crate::lifecycle::{PaneInfo, ProcessHost};
use crate::team::{NewTeam, TeamScope};
use chrono::{TimeZone, Utc};
use fleet_store::MemoryDocumentStore;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Host with in-memory sessions and panes
#[derive(Default)]
pub struct FakeHost {
    sessions: Mutex<BTreeMap<String, Vec<String>>>,
    keys: Mutex<Vec<(String, String)>>,
    next_pane: Mutex<u32>,
}

impl FakeHost {
    pub fn keys_sent(&self) -> Vec<(String, String)> {
        self.keys.lock().clone()
    }

    /// Simulate a pane dying outside our control
    pub fn drop_pane(&self, pane_id: &str) {
        for panes in self.sessions.lock().values_mut() {
            panes.retain(|p| p != pane_id);
        }
    }

    fn new_pane(&self, session: &str) -> FleetResult<PaneInfo> {
        let mut sessions = self.sessions.lock();
        let panes = sessions
            .get_mut(session)
            .ok_or_else(|| FleetError::host(format!("no session {}", session)))?;
        let mut next = self.next_pane.lock();
        *next += 1;
        let pane_id = format!("%{}", *next);
        panes.push(pane_id.clone());
        Ok(PaneInfo {
            pane_id,
            tty: Some(format!("/dev/pts/{}", *next)),
        })
    }
}

impl ProcessHost for FakeHost {
    fn has_session(&self, session: &str) -> bool {
        self.sessions.lock().contains_key(session)
    }

    fn create_session(&self, session: &str, _cwd: &Path) -> FleetResult<()> {
        self.sessions.lock().entry(session.to_string()).or_default();
        Ok(())
    }

    fn kill_session(&self, session: &str) -> FleetResult<()> {
        self.sessions.lock().remove(session);
        Ok(())
    }

    fn split_pane(&self, session: &str, _cwd: &Path) -> FleetResult<PaneInfo> {
        self.new_pane(session)
    }

    fn new_window(&self, session: &str, _cwd: &Path) -> FleetResult<PaneInfo> {
        self.new_pane(session)
    }

    fn send_keys(&self, pane_id: &str, keys: &str, _enter: bool) -> FleetResult<()> {
        self.keys.lock().push((pane_id.to_string(), keys.to_string()));
        Ok(())
    }

    fn kill_pane(&self, pane_id: &str) -> FleetResult<()> {
        self.drop_pane(pane_id);
        Ok(())
    }

    fn list_panes(&self, session: &str) -> FleetResult<Vec<PaneInfo>> {
        Ok(self
            .sessions
            .lock()
            .get(session)
            .map(|panes| {
                panes
                    .iter()
                    .map(|p| PaneInfo {
                        pane_id: p.clone(),
                        tty: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn select_pane(&self, _pane_id: &str) -> FleetResult<()> {
        Ok(())
    }

    fn interrupt_process(&self, pid: u32) -> FleetResult<()> {
        Err(FleetError::host(format!("no process {}", pid)))
    }
}

pub struct Fixture {
    pub fleet: Fleet,
    pub clock: Arc<ManualClock>,
    pub host: Arc<FakeHost>,
}

pub fn fixture() -> Fixture {
    fixture_with_host(Arc::new(FakeHost::default()))
}

pub fn fixture_with_host(host: Arc<FakeHost>) -> Fixture {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let fleet = Fleet::new(Arc::new(MemoryDocumentStore::new()), FleetConfig::default())
        .with_clock(clock.clone())
        .with_host(host.clone())
        .with_workdir("/work");
    Fixture { fleet, clock, host }
}

impl Fixture {
    /// Create team `alpha` led by `lead`
    pub fn alpha(&self) -> TeamScope<'_> {
        self.fleet
            .create_team(NewTeam::new("alpha"))
            .expect("create team");
        self.fleet.team("alpha").expect("open team")
    }
}
