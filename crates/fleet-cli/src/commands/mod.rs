//! CLI command implementations

pub mod collab;
pub mod diagnostics;
pub mod event;
pub mod hook;
pub mod member;
pub mod message;
pub mod task;
pub mod team;
pub mod worker;

use crate::console::CliConsole;
use crate::policy::{PolicyService, Role};
use anyhow::{Context as _, bail};
use fleet_core::{Fleet, TeamScope};

/// Everything a command handler needs
pub struct Context {
    pub fleet: Fleet,
    pub console: CliConsole,
    team: Option<String>,
    role: Role,
    policy: Box<dyn PolicyService>,
}

impl Context {
    pub fn new(
        fleet: Fleet,
        console: CliConsole,
        team: Option<String>,
        role: Role,
        policy: Box<dyn PolicyService>,
    ) -> Self {
        Self {
            fleet,
            console,
            team,
            role,
            policy,
        }
    }

    /// The selected team id
    pub fn team_id(&self) -> anyhow::Result<&str> {
        match self.team.as_deref() {
            Some(id) => Ok(id),
            None => bail!("No team selected; pass --team or set FLEET_TEAM"),
        }
    }

    /// Open the selected team
    pub fn scope(&self) -> anyhow::Result<TeamScope<'_>> {
        let id = self.team_id()?;
        self.fleet
            .team(id)
            .with_context(|| format!("Cannot open team {}", id))
    }

    /// Refuse unless the policy gate allows `action` on `team`
    pub fn authorize(&self, team: &str, action: &str) -> anyhow::Result<()> {
        let decision = self.policy.check(team, self.role, action);
        if !decision.allowed {
            bail!("Permission denied: {}", decision.reason);
        }
        tracing::debug!("Policy allowed {} for {} ({})", action, self.role, decision.reason);
        Ok(())
    }

    /// Open the selected team after checking `action`
    pub fn authorized_scope(&self, action: &str) -> anyhow::Result<TeamScope<'_>> {
        self.authorize(self.team_id()?, action)?;
        self.scope()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Context;
    use crate::console::CliConsole;
    use crate::policy::{Role, RoleMatrixPolicy};
    use fleet_core::{Fleet, FleetConfig, NewTeam};
    use fleet_store::MemoryDocumentStore;
    use std::sync::Arc;

    /// Context over an in-memory store with team `alpha` created
    pub fn context(role: Role) -> Context {
        let fleet = Fleet::new(Arc::new(MemoryDocumentStore::new()), FleetConfig::default())
            .with_workdir("/work");
        fleet.create_team(NewTeam::new("alpha")).unwrap();
        Context::new(
            fleet,
            CliConsole::new(false, true),
            Some("alpha".to_string()),
            role,
            Box::new(RoleMatrixPolicy),
        )
    }
}
