//! Per-team handle and document helpers

use super::model::{RuntimeState, Team};
use crate::error::{FleetError, FleetResult};
use crate::events::{Event, EventKind, EventLog};
use crate::fleet::Fleet;
use crate::lifecycle::{Lifecycle, WorkerBridge};
use crate::messaging::MessageLedger;
use crate::paths::TeamPaths;
use crate::recovery::Recovery;
use crate::scaling::Autoscaler;
use crate::tasks::TaskLedger;
use chrono::{DateTime, Utc};
use fleet_store::{DocumentStore, StoreExt};

/// One team's namespace within a [`Fleet`]
pub struct TeamScope<'a> {
    fleet: &'a Fleet,
    team_id: String,
    paths: TeamPaths,
}

impl std::fmt::Debug for TeamScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamScope")
            .field("team_id", &self.team_id)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl<'a> TeamScope<'a> {
    pub(crate) fn new(fleet: &'a Fleet, team_id: &str, paths: TeamPaths) -> Self {
        Self {
            fleet,
            team_id: team_id.to_string(),
            paths,
        }
    }

    pub fn id(&self) -> &str {
        &self.team_id
    }

    pub fn paths(&self) -> &TeamPaths {
        &self.paths
    }

    pub fn fleet(&self) -> &'a Fleet {
        self.fleet
    }

    pub fn store(&self) -> &'a dyn DocumentStore {
        self.fleet.store()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fleet.now()
    }

    /// Multiplexer session hosting this team's panes
    pub fn host_session(&self) -> String {
        self.fleet.config().session_name(&self.team_id)
    }

    /// Load the team configuration.
    ///
    /// Unlike other documents the config has no meaningful default, so an
    /// unreadable file is reported instead of silently replaced.
    pub fn load_team(&self) -> FleetResult<Team> {
        self.store()
            .try_load_json::<Team>(&self.paths.config())?
            .ok_or_else(|| FleetError::not_found("Team", &self.team_id))
    }

    pub fn save_team(&self, team: &mut Team) -> FleetResult<()> {
        team.updated_at = self.now();
        self.store().save_json(&self.paths.config(), team)?;
        Ok(())
    }

    /// Load, mutate and atomically replace the team config (last writer wins)
    pub fn update_team<R>(&self, f: impl FnOnce(&mut Team) -> FleetResult<R>) -> FleetResult<R> {
        let mut team = self.load_team()?;
        let out = f(&mut team)?;
        self.save_team(&mut team)?;
        Ok(out)
    }

    pub fn load_runtime(&self) -> RuntimeState {
        self.store().load_json(&self.paths.runtime())
    }

    /// Mutate the runtime document under the sequence lock
    pub fn update_runtime<R>(
        &self,
        f: impl FnOnce(&mut RuntimeState) -> FleetResult<R>,
    ) -> FleetResult<R> {
        self.store().with_lock(&self.paths.runtime_lock(), || {
            let mut runtime = self.load_runtime();
            let out = f(&mut runtime)?;
            runtime.updated_at = Some(self.now());
            self.store().save_json(&self.paths.runtime(), &runtime)?;
            Ok(out)
        })
    }

    /// Append one event to the team log
    pub fn emit(&self, kind: EventKind) -> FleetResult<Event> {
        self.events().emit(kind)
    }

    pub fn events(&self) -> EventLog<'_> {
        EventLog::new(self)
    }

    pub fn tasks(&self) -> TaskLedger<'_> {
        TaskLedger::new(self)
    }

    pub fn messages(&self) -> MessageLedger<'_> {
        MessageLedger::new(self)
    }

    pub fn members(&self) -> Lifecycle<'_> {
        Lifecycle::new(self)
    }

    pub fn workers(&self) -> WorkerBridge<'_> {
        WorkerBridge::new(self)
    }

    pub fn recovery(&self) -> Recovery<'_> {
        Recovery::new(self)
    }

    pub fn scaling(&self) -> Autoscaler<'_> {
        Autoscaler::new(self)
    }
}
