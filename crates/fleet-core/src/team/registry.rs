//! Team registry: create, start/stop, status, teardown, archive and gc

use super::model::{
    Binding, IndexEntry, Member, MemberKind, MemberStatus, Role, RuntimeState, Team, TeamIndex,
    TeamState,
};
use super::scope::TeamScope;
use crate::error::{FleetError, FleetResult};
use crate::events::{Event, EventKind};
use crate::fleet::Fleet;
use crate::ids::{slugify, validate_id};
use crate::paths::{ARCHIVE_DIR, TEAM_INDEX, terminals};
use crate::scaling::BudgetSnapshot;
use crate::tasks::TaskStatus;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use fleet_store::StoreExt;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const ARCHIVE_STAMP: &str = "%Y%m%dT%H%M%S%.3fZ";
const DASHBOARD_EVENTS: usize = 10;

/// Input for [`Fleet::create_team`]
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    /// Defaults to the slug of `name`
    pub team_id: Option<String>,
    pub description: Option<String>,
    pub lead_member_id: String,
    pub lead_session_id: Option<String>,
    pub cwd: Option<String>,
    /// Replace an existing team with the same id
    pub force: bool,
}

impl NewTeam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team_id: None,
            description: None,
            lead_member_id: "lead".to_string(),
            lead_session_id: None,
            cwd: None,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatus {
    pub team_id: String,
    pub name: String,
    pub state: TeamState,
    pub host_session: String,
    pub host_session_live: bool,
    pub task_counts: BTreeMap<String, usize>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(flatten)]
    pub status: TeamStatus,
    pub open_messages: usize,
    pub stale_messages: usize,
    pub budget: Option<BudgetSnapshot>,
    pub recent_events: Vec<Event>,
}

/// Contents of `summary.json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownSummary {
    pub team_id: String,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub task_counts: BTreeMap<String, usize>,
    pub members: BTreeMap<String, MemberStatus>,
    pub stopped_members: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    pub archives_removed: Vec<String>,
    pub cursors_pruned: usize,
    pub claims_dropped: usize,
}

impl Fleet {
    pub fn list_teams(&self) -> Vec<IndexEntry> {
        self.store().load_json::<TeamIndex>(TEAM_INDEX).teams
    }

    fn update_index(&self, f: impl FnOnce(&mut TeamIndex)) -> FleetResult<()> {
        let mut index: TeamIndex = self.store().load_json(TEAM_INDEX);
        f(&mut index);
        self.store().save_json(TEAM_INDEX, &index)?;
        Ok(())
    }

    /// Create a team namespace with its lead
    pub fn create_team(&self, new: NewTeam) -> FleetResult<Team> {
        if new.name.trim().is_empty() {
            return Err(FleetError::validation_field("Team name must not be empty", "name"));
        }
        let team_id = new.team_id.clone().unwrap_or_else(|| slugify(&new.name));
        validate_id("team id", &team_id)?;
        validate_id("member id", &new.lead_member_id)?;
        if let Some(sid) = &new.lead_session_id {
            validate_id("session id", sid)?;
        }

        let scope = self.scope(&team_id)?;
        if self.store().exists(&scope.paths().config()) {
            if !new.force {
                return Err(FleetError::conflict(format!("Team {} already exists", team_id)));
            }
            warn!("Replacing existing team {}", team_id);
            self.store().remove_dir(scope.paths().root())?;
        }

        let now = self.now();
        let mut lead = Member::new(&new.lead_member_id, Role::Lead, MemberKind::Session, now);
        lead.binding = Binding::Session {
            session_id: new.lead_session_id.clone(),
            tty: None,
            pid: None,
        };
        lead.cwd = new.cwd.clone();

        let mut team = Team {
            team_id: team_id.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            lead_member_id: new.lead_member_id.clone(),
            members: vec![lead],
            ownership: None,
            created_at: now,
            updated_at: now,
        };
        scope.save_team(&mut team)?;
        self.store()
            .save_json(&scope.paths().runtime(), &RuntimeState::default())?;
        self.update_index(|index| {
            index.upsert(IndexEntry {
                team_id: team_id.clone(),
                name: new.name.clone(),
                updated_at: now,
            })
        })?;

        scope.emit(EventKind::TeamCreated {
            team_id: team_id.clone(),
            name: new.name.clone(),
            lead: new.lead_member_id.clone(),
        })?;
        info!("Created team {}", team_id);
        Ok(team)
    }

    /// Remove old archives, dead cursors and leftover expired claims
    pub fn gc(&self, max_age: Duration) -> FleetResult<GcReport> {
        let now = self.now();
        let cutoff = now - max_age;
        let mut report = GcReport::default();

        for name in self.store().list(ARCHIVE_DIR)? {
            let stamp = name
                .rsplit_once('-')
                .and_then(|(_, s)| NaiveDateTime::parse_from_str(s, ARCHIVE_STAMP).ok())
                .map(|t| t.and_utc());
            match stamp {
                Some(at) if at < cutoff => {
                    self.store().remove_dir(&format!("{}/{}", ARCHIVE_DIR, name))?;
                    report.archives_removed.push(name);
                }
                Some(_) => {}
                None => debug!("Skipping unrecognized archive entry {}", name),
            }
        }

        for entry in self.list_teams() {
            let Ok(scope) = self.team(&entry.team_id) else {
                continue;
            };
            report.cursors_pruned += scope.prune_cursors(cutoff)?;
            report.claims_dropped += scope.drop_dead_claims()?;
        }

        info!(
            "gc removed {} archives, {} cursors, {} claims",
            report.archives_removed.len(),
            report.cursors_pruned,
            report.claims_dropped
        );
        Ok(report)
    }
}

pub(crate) fn task_counts(scope: &TeamScope<'_>) -> BTreeMap<String, usize> {
    let board = scope.tasks().board();
    TaskStatus::ALL
        .into_iter()
        .map(|s| (s.to_string(), board.count(s)))
        .collect()
}

impl<'a> TeamScope<'a> {
    /// Ensure the host session exists and mark the team running
    pub fn start(&self) -> FleetResult<RuntimeState> {
        self.load_team()?;
        let host = self.fleet().host();
        let session = self.host_session();
        if !host.has_session(&session) {
            host.create_session(&session, self.fleet().workdir())?;
        }
        let runtime = self.update_runtime(|runtime| {
            runtime.state = TeamState::Running;
            runtime.host_session = Some(session.clone());
            Ok(runtime.clone())
        })?;
        self.emit(EventKind::TeamStarted {
            host_session: session,
        })?;
        info!("Started team {}", self.id());
        Ok(runtime)
    }

    /// Mark the team stopped, killing the host session unless `keep_session`
    pub fn stop(&self, keep_session: bool) -> FleetResult<RuntimeState> {
        self.load_team()?;
        let host = self.fleet().host();
        let session = self.host_session();
        let mut killed_session = false;
        if !keep_session && host.has_session(&session) {
            match host.kill_session(&session) {
                Ok(()) => killed_session = true,
                Err(e) => warn!("Could not kill session {}: {}", session, e),
            }
        }
        let runtime = self.update_runtime(|runtime| {
            runtime.state = TeamState::Stopped;
            Ok(runtime.clone())
        })?;
        self.emit(EventKind::TeamStopped { killed_session })?;
        info!("Stopped team {}", self.id());
        Ok(runtime)
    }

    pub fn status(&self) -> FleetResult<TeamStatus> {
        let team = self.load_team()?;
        let runtime = self.load_runtime();
        let session = self.host_session();
        Ok(TeamStatus {
            team_id: team.team_id,
            name: team.name,
            state: runtime.state,
            host_session_live: self.fleet().host().has_session(&session),
            host_session: session,
            task_counts: task_counts(self),
            members: team.members,
        })
    }

    pub fn dashboard(&self) -> FleetResult<Dashboard> {
        let status = self.status()?;
        let stale_secs = self.fleet().config().stale_message_secs;
        Ok(Dashboard {
            status,
            open_messages: self.messages().open_messages(None).len(),
            stale_messages: self.messages().stale_messages(stale_secs).len(),
            budget: self.scaling().budget(),
            recent_events: self.events().tail(DASHBOARD_EVENTS),
        })
    }

    /// Write `summary.json`, stop the team and every teammate
    pub fn teardown(&self, note: Option<String>, keep_session: bool) -> FleetResult<TeardownSummary> {
        let team = self.load_team()?;
        let now = self.now();

        let stopped_members: Vec<String> = team
            .teammates()
            .filter(|m| !matches!(m.status, MemberStatus::Stopped | MemberStatus::Replaced))
            .map(|m| m.member_id.clone())
            .collect();

        self.stop(keep_session)?;
        self.update_team(|team| {
            for member in team.members.iter_mut() {
                if stopped_members.contains(&member.member_id) {
                    member.status = MemberStatus::Stopped;
                    member.updated_at = now;
                }
            }
            Ok(())
        })?;

        let team = self.load_team()?;
        let summary = TeardownSummary {
            team_id: team.team_id.clone(),
            ts: now,
            note,
            task_counts: task_counts(self),
            members: team
                .members
                .iter()
                .map(|m| (m.member_id.clone(), m.status))
                .collect(),
            stopped_members: stopped_members.clone(),
        };
        let key = self.paths().summary();
        self.store().save_json(&key, &summary)?;

        self.update_runtime(|runtime| {
            runtime.state = TeamState::TornDown;
            Ok(())
        })?;
        self.emit(EventKind::TeamTeardown {
            summary: key,
            stopped_members,
        })?;
        info!("Tore down team {}", self.id());
        Ok(summary)
    }

    /// Move the namespace under `archive/` and drop it from the index.
    /// Returns the archive key.
    pub fn archive(&self) -> FleetResult<String> {
        self.load_team()?;
        let fleet = self.fleet();
        let mut at = self.now();
        let target = loop {
            let candidate = format!("{}/{}-{}", ARCHIVE_DIR, self.id(), at.format(ARCHIVE_STAMP));
            if !self.store().exists(&candidate) {
                break candidate;
            }
            at += Duration::milliseconds(1);
        };

        self.emit(EventKind::TeamArchived {
            archive: target.clone(),
        })?;
        self.store().rename_dir(self.paths().root(), &target)?;
        fleet.update_index(|index| index.remove(self.id()))?;
        info!("Archived team {} to {}", self.id(), target);
        Ok(target)
    }

    /// Delete cursor files with no member or session behind them that were
    /// last written before `cutoff`
    fn prune_cursors(&self, cutoff: DateTime<Utc>) -> FleetResult<usize> {
        let team = self.load_team()?;
        let dir = self.paths().cursors_dir();
        let mut pruned = 0;
        for name in self.store().list(&dir)? {
            let Some(consumer) = name.strip_suffix(".txt") else {
                continue;
            };
            let live = team.member(consumer).is_some()
                || consumer.strip_prefix("session-").is_some_and(|sid| {
                    team.members.iter().any(|m| m.session_id() == Some(sid))
                        || self.store().exists(&terminals::session(sid))
                });
            if live {
                continue;
            }
            let key = format!("{}/{}", dir, name);
            let stale = self
                .store()
                .modified(&key)?
                .is_none_or(|modified| modified < cutoff);
            if stale {
                self.store().remove(&key)?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Remove expired claim files whose task no longer names that owner
    fn drop_dead_claims(&self) -> FleetResult<usize> {
        let now = self.now();
        let tasks = self.tasks();
        self.store().with_lock(&self.paths().tasks_lock(), || {
            let board = tasks.board();
            let mut dropped = 0;
            for task_id in tasks.claim_files()? {
                let Some(claim) = tasks.claim_of(&task_id) else {
                    continue;
                };
                let held = board.get(&task_id).is_some_and(|t| {
                    t.status.is_owned() && t.claimed_by.as_deref() == Some(claim.claimed_by.as_str())
                });
                if claim.is_expired_at(now) && !held {
                    self.store().remove(&self.paths().claim(&task_id))?;
                    dropped += 1;
                }
            }
            Ok::<_, FleetError>(dropped)
        })
    }
}
