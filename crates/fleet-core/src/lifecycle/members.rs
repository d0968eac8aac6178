//! Member lifecycle: add, attach, spawn, interrupt, restart, replace, pause

use super::host::PaneInfo;
use crate::error::{FleetError, FleetResult};
use crate::events::{EventKind, InterruptMode};
use crate::ids::validate_id;
use crate::messaging::{DeliveryChannel, Priority};
use crate::paths::terminals;
use crate::tasks::Task;
use crate::team::{
    Binding, Member, MemberKind, MemberStatus, Role, SessionRecord, SpawnMode, Team, TeamScope,
};
use fleet_store::StoreExt;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Input for [`Lifecycle::add_member`]
#[derive(Debug, Clone)]
pub struct NewMember {
    pub member_id: String,
    pub name: Option<String>,
    pub role: Role,
    pub kind: MemberKind,
    pub agent_type: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
}

impl NewMember {
    pub fn teammate(member_id: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            member_id: member_id.into(),
            name: None,
            role: Role::Teammate,
            kind,
            agent_type: None,
            model: None,
            cwd: None,
        }
    }
}

/// Options for spawning a hosted pane
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Initial prompt passed to the agent
    pub prompt: Option<String>,
    pub cwd: Option<String>,
    pub agent_type: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachOutcome {
    pub member: Member,
    /// Mailbox entries moved into the session inbox
    pub flushed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartOutcome {
    pub member_id: String,
    pub respawned: bool,
    pub resumed_tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    pub old_member_id: String,
    pub new_member_id: String,
    pub transferred_tasks: Vec<String>,
    pub transferred_workers: usize,
    pub spawned: bool,
}

/// Member lifecycle of one team
pub struct Lifecycle<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> Lifecycle<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    pub(crate) fn scope(&self) -> &'a TeamScope<'a> {
        self.scope
    }

    fn require<'t>(team: &'t Team, member_id: &str) -> FleetResult<&'t Member> {
        team.member(member_id)
            .ok_or_else(|| FleetError::not_found("Member", member_id))
    }

    fn set_status(&self, member_id: &str, status: MemberStatus) -> FleetResult<Member> {
        let now = self.scope.now();
        self.scope.update_team(|team| {
            let member = team
                .member_mut(member_id)
                .ok_or_else(|| FleetError::not_found("Member", member_id))?;
            member.status = status;
            member.updated_at = now;
            Ok(member.clone())
        })
    }

    pub fn get(&self, member_id: &str) -> FleetResult<Member> {
        let team = self.scope.load_team()?;
        Self::require(&team, member_id).cloned()
    }

    pub fn list(&self) -> FleetResult<Vec<Member>> {
        Ok(self.scope.load_team()?.members)
    }

    /// Register a member with no execution binding yet
    pub fn add_member(&self, new: NewMember) -> FleetResult<Member> {
        validate_id("member id", &new.member_id)?;
        let now = self.scope.now();

        let member = self.scope.update_team(|team| {
            if team.member(&new.member_id).is_some() {
                return Err(FleetError::conflict(format!(
                    "Member {} already exists",
                    new.member_id
                )));
            }
            if new.role == Role::Lead {
                return Err(FleetError::conflict(format!(
                    "Team already has lead {}",
                    team.lead_member_id
                )));
            }
            let mut member = Member::new(&new.member_id, new.role, new.kind, now);
            if let Some(name) = &new.name {
                member.name = name.clone();
            }
            member.agent_type = new.agent_type.clone();
            member.model = new.model.clone();
            member.cwd = new.cwd.clone();
            team.members.push(member.clone());
            Ok(member)
        })?;

        self.scope.emit(EventKind::TeammateJoined {
            member_id: member.member_id.clone(),
            kind: member.kind(),
            role: member.role,
        })?;
        info!("Member {} joined team {}", member.member_id, self.scope.id());
        Ok(member)
    }

    /// Bind a member to an agent session and flush its mailbox into the session inbox
    pub fn attach(
        &self,
        member_id: &str,
        session_id: &str,
        pid: Option<u32>,
        tty: Option<String>,
    ) -> FleetResult<AttachOutcome> {
        validate_id("member id", member_id)?;
        validate_id("session id", session_id)?;
        let record: Option<SessionRecord> = self
            .scope
            .store()
            .try_load_json(&terminals::session(session_id))
            .unwrap_or(None);
        let pid = pid.or(record.as_ref().and_then(|r| r.pid));
        let tty = tty.or_else(|| record.as_ref().and_then(|r| r.tty.clone()));
        let cwd = record.as_ref().and_then(|r| r.cwd.clone());
        let now = self.scope.now();

        let member = self.scope.update_team(|team| {
            let member = team
                .member_mut(member_id)
                .ok_or_else(|| FleetError::not_found("Member", member_id))?;
            member.binding = match &member.binding {
                Binding::Pane {
                    pane_id,
                    pane_tty,
                    host_session,
                    spawn_mode,
                    ..
                } => Binding::Pane {
                    pane_id: pane_id.clone(),
                    pane_tty: pane_tty.clone(),
                    host_session: host_session.clone(),
                    spawn_mode: *spawn_mode,
                    session_id: Some(session_id.to_string()),
                },
                Binding::Session { .. } | Binding::Worker => Binding::Session {
                    session_id: Some(session_id.to_string()),
                    tty: tty.clone(),
                    pid,
                },
            };
            if member.cwd.is_none() {
                member.cwd = cwd.clone();
            }
            member.status = MemberStatus::Active;
            member.last_seen = Some(now);
            member.updated_at = now;
            Ok(member.clone())
        })?;

        let flushed = self.scope.messages().flush_mailbox(member_id, session_id)?;
        self.scope.emit(EventKind::TeammateAttached {
            member_id: member_id.to_string(),
            session_id: session_id.to_string(),
            flushed,
        })?;
        info!("Member {} attached to session {}", member_id, session_id);
        Ok(AttachOutcome { member, flushed })
    }

    /// Create a hosted pane for a member (adding it if needed) and launch the agent
    pub fn spawn(&self, member_id: &str, options: SpawnOptions) -> FleetResult<Member> {
        validate_id("member id", member_id)?;
        let team = self.scope.load_team()?;
        if team.member(member_id).is_none() {
            let mut new = NewMember::teammate(member_id, MemberKind::Pane);
            new.agent_type = options.agent_type.clone();
            new.model = options.model.clone();
            new.cwd = options.cwd.clone();
            self.add_member(new)?;
        }
        let team = self.scope.load_team()?;
        let member = Self::require(&team, member_id)?.clone();

        let host = self.scope.fleet().host();
        let session = self.scope.host_session();
        let cwd = options
            .cwd
            .clone()
            .or_else(|| member.cwd.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.scope.fleet().workdir().clone());

        if !host.has_session(&session) {
            host.create_session(&session, &cwd)?;
        }
        let (pane, mode) = match host.split_pane(&session, &cwd) {
            Ok(pane) => (pane, SpawnMode::SplitPane),
            Err(e) => {
                warn!("split-pane failed for {}, opening a window: {}", member_id, e);
                (host.new_window(&session, &cwd)?, SpawnMode::NewWindow)
            }
        };

        let model = options.model.clone().or_else(|| member.model.clone());
        let command = self.launch_command(member_id, &cwd, model.as_deref(), options.prompt.as_deref());
        host.send_keys(&pane.pane_id, &command, true)?;

        let now = self.scope.now();
        let PaneInfo { pane_id, tty } = pane;
        let member = self.scope.update_team(|team| {
            let member = team
                .member_mut(member_id)
                .ok_or_else(|| FleetError::not_found("Member", member_id))?;
            member.binding = Binding::Pane {
                pane_id: Some(pane_id.clone()),
                pane_tty: tty.clone(),
                host_session: Some(session.clone()),
                spawn_mode: Some(mode),
                session_id: None,
            };
            member.status = MemberStatus::Starting;
            member.cwd = Some(cwd.to_string_lossy().into_owned());
            if options.agent_type.is_some() {
                member.agent_type = options.agent_type.clone();
            }
            member.model = model.clone();
            member.last_spawned_at = Some(now);
            member.updated_at = now;
            Ok(member.clone())
        })?;

        self.scope.emit(EventKind::TeammateSpawned {
            member_id: member_id.to_string(),
            pane_id,
            host_session: session,
        })?;
        info!("Spawned {} in team {}", member_id, self.scope.id());
        Ok(member)
    }

    fn launch_command(
        &self,
        member_id: &str,
        cwd: &std::path::Path,
        model: Option<&str>,
        prompt: Option<&str>,
    ) -> String {
        let fleet = self.scope.fleet();
        let home = fleet
            .store()
            .root()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut command = format!(
            "export FLEET_TEAM={} FLEET_MEMBER={} FLEET_HOME={}; cd {} && {}",
            shell_quote(self.scope.id()),
            shell_quote(member_id),
            shell_quote(&home),
            shell_quote(&cwd.to_string_lossy()),
            fleet.config().agent_command
        );
        if let Some(model) = model {
            command.push_str(&format!(" --model {}", shell_quote(model)));
        }
        if let Some(prompt) = prompt {
            command.push(' ');
            command.push_str(&shell_quote(prompt));
        }
        command
    }

    /// Bring a member's pane to the front
    pub fn focus(&self, member_id: &str) -> FleetResult<String> {
        let member = self.get(member_id)?;
        let pane = member.pane_id().ok_or_else(|| {
            FleetError::conflict(format!("Member {} has no hosted pane", member_id))
        })?;
        self.scope.fleet().host().select_pane(pane)?;
        Ok(pane.to_string())
    }

    /// Best-effort cancellation: pane keystrokes, then SIGINT, then an urgent notice
    pub fn interrupt(&self, member_id: &str, message: Option<&str>) -> FleetResult<InterruptMode> {
        let member = self.get(member_id)?;
        let host = self.scope.fleet().host();
        let mut mode = None;

        if let Some(pane) = member.pane_id() {
            match host.send_keys(pane, "C-c", false) {
                Ok(()) => {
                    if let Some(text) = message {
                        if let Err(e) = host.send_keys(pane, text, true) {
                            warn!("Interrupt message to {} not typed: {}", member_id, e);
                        }
                    }
                    mode = Some(InterruptMode::Pane);
                }
                Err(e) => warn!("Pane interrupt for {} failed: {}", member_id, e),
            }
        }

        if mode.is_none() {
            if let Some(pid) = member.host_pid() {
                match host.interrupt_process(pid) {
                    Ok(()) => mode = Some(InterruptMode::Signal),
                    Err(e) => warn!("Signal interrupt for {} failed: {}", member_id, e),
                }
            }
        }

        let mode = match mode {
            Some(mode) => mode,
            None => {
                let mut notice =
                    "[INTERRUPT REQUEST] Stop the current step and check in with the lead.".to_string();
                if let Some(text) = message {
                    notice.push(' ');
                    notice.push_str(text);
                }
                let delivery = self.scope.messages().notify(&member, &notice, Priority::Urgent)?;
                if delivery.channel == DeliveryChannel::Inbox {
                    InterruptMode::Inbox
                } else {
                    InterruptMode::Mailbox
                }
            }
        };

        self.scope.emit(EventKind::TeammateInterrupted {
            member_id: member_id.to_string(),
            mode,
            message: message.map(str::to_string),
        })?;
        info!("Interrupted {} via {:?}", member_id, mode);
        Ok(mode)
    }

    /// Directive sent to a respawned member
    pub(crate) fn resume_prompt(&self, team: &Team, tasks: &[Task]) -> String {
        let lead = &team.lead_member_id;
        if tasks.is_empty() {
            return format!(
                "Resume work in team {}. You hold no claimed tasks; check the task list and report status to {}.",
                team.team_id, lead
            );
        }
        let listed: Vec<String> = tasks
            .iter()
            .map(|t| format!("{} ({}, {})", t.task_id, t.title, t.status))
            .collect();
        format!(
            "Resume work in team {}. Your claimed tasks: {}. Report status to {}.",
            team.team_id,
            listed.join("; "),
            lead
        )
    }

    /// Respawn a hosted member with a resume prompt; other kinds are only flagged
    pub fn restart(&self, member_id: &str) -> FleetResult<RestartOutcome> {
        let team = self.scope.load_team()?;
        let member = Self::require(&team, member_id)?.clone();
        let tasks = self.scope.tasks().owned_by(member_id);
        let resumed_tasks: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();

        let respawned = match member.kind() {
            MemberKind::Pane => {
                if let Some(pane) = member.pane_id() {
                    if let Err(e) = self.scope.fleet().host().kill_pane(pane) {
                        warn!("Could not kill pane {} of {}: {}", pane, member_id, e);
                    }
                }
                let prompt = self.resume_prompt(&team, &tasks);
                self.spawn(
                    member_id,
                    SpawnOptions {
                        prompt: Some(prompt),
                        ..Default::default()
                    },
                )?;
                true
            }
            MemberKind::Session | MemberKind::Worker => {
                self.set_status(member_id, MemberStatus::RestartRequested)?;
                false
            }
        };

        self.scope.emit(EventKind::TeammateRestarted {
            member_id: member_id.to_string(),
            resumed_tasks: resumed_tasks.clone(),
            respawned,
        })?;
        Ok(RestartOutcome {
            member_id: member_id.to_string(),
            respawned,
            resumed_tasks,
        })
    }

    /// Hand a member's identity, claims and worker bindings to a new member id
    pub fn replace(
        &self,
        old_id: &str,
        new_id: &str,
        stop_old: bool,
        spawn_new: bool,
    ) -> FleetResult<ReplaceOutcome> {
        validate_id("member id", old_id)?;
        validate_id("member id", new_id)?;
        let now = self.scope.now();

        let old = self.scope.update_team(|team| {
            if team.is_lead(old_id) {
                return Err(FleetError::conflict("The lead member cannot be replaced"));
            }
            if team.member(new_id).is_some() {
                return Err(FleetError::conflict(format!("Member {} already exists", new_id)));
            }
            let old = Self::require(team, old_id)?.clone();

            let mut fresh = Member::new(new_id, Role::Teammate, old.kind(), now);
            fresh.agent_type = old.agent_type.clone();
            fresh.model = old.model.clone();
            fresh.cwd = old.cwd.clone();
            team.members.push(fresh);

            if let Some(member) = team.member_mut(old_id) {
                member.status = MemberStatus::Replaced;
                member.replaced_by = Some(new_id.to_string());
                member.updated_at = now;
            }
            Ok(old)
        })?;

        let transferred_tasks = self.scope.tasks().transfer_claims(old_id, new_id)?;
        let transferred_workers = self.scope.workers().transfer(old_id, new_id)?;

        if stop_old {
            if let Some(pane) = old.pane_id() {
                if let Err(e) = self.scope.fleet().host().kill_pane(pane) {
                    warn!("Could not stop pane {} of {}: {}", pane, old_id, e);
                }
            }
        }

        let spawned = spawn_new && old.kind() == MemberKind::Pane;
        if spawned {
            let team = self.scope.load_team()?;
            let tasks = self.scope.tasks().owned_by(new_id);
            let prompt = self.resume_prompt(&team, &tasks);
            self.spawn(
                new_id,
                SpawnOptions {
                    prompt: Some(prompt),
                    ..Default::default()
                },
            )?;
        }

        self.scope.emit(EventKind::TeammateReplaced {
            old_member_id: old_id.to_string(),
            new_member_id: new_id.to_string(),
            transferred_tasks: transferred_tasks.clone(),
            transferred_workers,
        })?;
        info!("Replaced {} with {}", old_id, new_id);
        Ok(ReplaceOutcome {
            old_member_id: old_id.to_string(),
            new_member_id: new_id.to_string(),
            transferred_tasks,
            transferred_workers,
            spawned,
        })
    }

    /// Copy a member's settings into a fresh, unbound member
    pub fn clone_member(&self, source_id: &str, new_id: &str) -> FleetResult<Member> {
        let source = self.get(source_id)?;
        self.add_member(NewMember {
            member_id: new_id.to_string(),
            name: None,
            role: Role::Teammate,
            kind: source.kind(),
            agent_type: source.agent_type.clone(),
            model: source.model.clone(),
            cwd: source.cwd.clone(),
        })
    }

    pub fn pause(&self, member_id: &str) -> FleetResult<Member> {
        let team = self.scope.load_team()?;
        Self::require(&team, member_id)?;
        if team.is_lead(member_id) {
            return Err(FleetError::conflict("The lead member cannot be paused"));
        }
        let member = self.set_status(member_id, MemberStatus::Paused)?;
        self.scope.emit(EventKind::TeammatePaused {
            member_id: member_id.to_string(),
        })?;
        Ok(member)
    }

    /// Wake a paused or stopped member: active with a live binding, idle otherwise
    pub fn resume(&self, member_id: &str) -> FleetResult<Member> {
        let member = self.get(member_id)?;
        if !matches!(member.status, MemberStatus::Paused | MemberStatus::Stopped) {
            return Ok(member);
        }
        let status = if member.has_binding() {
            MemberStatus::Active
        } else {
            MemberStatus::Idle
        };
        let member = self.set_status(member_id, status)?;
        self.scope.emit(EventKind::TeammateResumed {
            member_id: member_id.to_string(),
        })?;
        Ok(member)
    }

    /// Pause every teammate that is not already dormant; the lead is untouched
    pub fn pause_all(&self) -> FleetResult<Vec<String>> {
        let team = self.scope.load_team()?;
        let targets: Vec<String> = team
            .teammates()
            .filter(|m| !m.is_dormant())
            .map(|m| m.member_id.clone())
            .collect();
        for member_id in &targets {
            self.pause(member_id)?;
        }
        Ok(targets)
    }

    /// Resume every paused teammate
    pub fn resume_all(&self) -> FleetResult<Vec<String>> {
        let team = self.scope.load_team()?;
        let targets: Vec<String> = team
            .teammates()
            .filter(|m| m.status == MemberStatus::Paused)
            .map(|m| m.member_id.clone())
            .collect();
        for member_id in &targets {
            self.resume(member_id)?;
        }
        Ok(targets)
    }

    /// Stop a teammate, optionally killing its pane
    pub fn stop(&self, member_id: &str, kill_pane: bool) -> FleetResult<Member> {
        let team = self.scope.load_team()?;
        let member = Self::require(&team, member_id)?.clone();
        if team.is_lead(member_id) {
            return Err(FleetError::conflict("The lead member cannot be stopped"));
        }
        if kill_pane {
            if let Some(pane) = member.pane_id() {
                if let Err(e) = self.scope.fleet().host().kill_pane(pane) {
                    warn!("Could not kill pane {} of {}: {}", pane, member_id, e);
                }
            }
        }
        let member = self.set_status(member_id, MemberStatus::Stopped)?;
        self.scope.emit(EventKind::TeammateStopped {
            member_id: member_id.to_string(),
        })?;
        Ok(member)
    }
}

/// Single-quote for POSIX shells
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
