//! Engine handle shared by every team operation

use crate::clock::{Clock, SystemClock};
use crate::config::FleetConfig;
use crate::error::{FleetError, FleetResult};
use crate::ids::validate_id;
use crate::lifecycle::{ProcessHost, TmuxHost};
use crate::paths::TeamPaths;
use crate::scaling::{CostAccounting, FileCostAccounting};
use crate::team::TeamScope;
use chrono::{DateTime, Utc};
use fleet_store::{DocumentStore, LocalDocumentStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Store, configuration and collaborators for one state root.
#[derive(Clone)]
pub struct Fleet {
    store: Arc<dyn DocumentStore>,
    config: FleetConfig,
    clock: Arc<dyn Clock>,
    host: Arc<dyn ProcessHost>,
    costs: Option<Arc<dyn CostAccounting>>,
    workdir: PathBuf,
}

impl Fleet {
    /// Engine over an arbitrary store, with the system clock and tmux as host
    pub fn new(store: Arc<dyn DocumentStore>, config: FleetConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
            host: Arc::new(TmuxHost::new()),
            costs: None,
            workdir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }

    /// Engine over the filesystem store at the configured home
    pub fn open(config: FleetConfig) -> FleetResult<Self> {
        config.validate()?;
        let home = config.home_dir()?;
        debug!("Opening fleet state at {:?}", home);

        let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::with_path(home));
        let costs: Arc<dyn CostAccounting> = Arc::new(FileCostAccounting::new(Arc::clone(&store)));
        Ok(Self::new(store, config).with_costs(costs))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn ProcessHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_costs(mut self, costs: Arc<dyn CostAccounting>) -> Self {
        self.costs = Some(costs);
        self
    }

    /// Base directory for resolving relative task file paths and spawn cwd
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn host(&self) -> &dyn ProcessHost {
        self.host.as_ref()
    }

    pub fn costs(&self) -> Option<&dyn CostAccounting> {
        self.costs.as_deref()
    }

    pub fn workdir(&self) -> &PathBuf {
        &self.workdir
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Handle on an existing team
    pub fn team(&self, team_id: &str) -> FleetResult<TeamScope<'_>> {
        let scope = self.scope(team_id)?;
        if !self.store.exists(&scope.paths().config()) {
            return Err(FleetError::not_found("Team", team_id));
        }
        Ok(scope)
    }

    /// Handle on a team namespace without requiring it to exist
    pub(crate) fn scope(&self, team_id: &str) -> FleetResult<TeamScope<'_>> {
        validate_id("team id", team_id)?;
        Ok(TeamScope::new(self, team_id, TeamPaths::new(team_id)))
    }
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("home", &self.store.root())
            .field("has_costs", &self.costs.is_some())
            .finish()
    }
}
