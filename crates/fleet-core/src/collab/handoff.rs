//! Shift handoff snapshots under `handoffs/`

use super::Collaboration;
use crate::error::FleetResult;
use crate::events::{Event, EventKind};
use crate::tasks::TaskStatus;
use crate::team::{MemberStatus, Presence, Role, TeamState, task_counts};
use chrono::{DateTime, Duration, Utc};
use fleet_store::StoreExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

const HANDOFF_STAMP: &str = "%Y%m%dT%H%M%S%.3fZ";
const HANDOFF_TASKS: usize = 10;
const HANDOFF_EVENTS: usize = 10;
/// Events since the snapshot shown by `latest_handoff`
const HANDOFF_FOLLOWUP_EVENTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffTask {
    pub task_id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub claimed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffMember {
    pub member_id: String,
    pub role: Role,
    pub status: MemberStatus,
    #[serde(default)]
    pub presence: Option<Presence>,
}

/// Team state captured for the next operator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    pub handoff_id: String,
    pub team_id: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub note: Option<String>,
    pub state: TeamState,
    pub task_counts: BTreeMap<String, usize>,
    /// Unfinished tasks, owned ones first
    pub open_tasks: Vec<HandoffTask>,
    pub members: Vec<HandoffMember>,
    pub open_messages: usize,
    /// Id of the newest event when the snapshot was taken
    pub last_event_id: u64,
    pub recent_events: Vec<Event>,
}

/// The newest handoff compared with the team as it is now
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffView {
    pub handoff: Handoff,
    /// Per-status change in task counts since the snapshot
    pub task_delta: BTreeMap<String, i64>,
    pub events_since: Vec<Event>,
}

impl Collaboration<'_> {
    /// Snapshot tasks, members and recent events into a new handoff file
    pub fn create_handoff(&self, created_by: &str, note: Option<String>) -> FleetResult<Handoff> {
        let scope = self.scope;
        let team = scope.load_team()?;
        let board = scope.tasks().board();

        let mut open_tasks: Vec<HandoffTask> = board
            .tasks
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| HandoffTask {
                task_id: t.task_id.clone(),
                title: t.title.clone(),
                status: t.status,
                claimed_by: t.claimed_by.clone(),
            })
            .collect();
        open_tasks.sort_by_key(|t| !t.status.is_owned());
        open_tasks.truncate(HANDOFF_TASKS);

        let members = team
            .members
            .iter()
            .map(|m| HandoffMember {
                member_id: m.member_id.clone(),
                role: m.role,
                status: m.status,
                presence: m.presence,
            })
            .collect();

        let recent_events = scope.events().tail(HANDOFF_EVENTS);
        let handoff = Handoff {
            handoff_id: self.next_handoff_id(),
            team_id: team.team_id,
            created_at: scope.now(),
            created_by: created_by.to_string(),
            note,
            state: scope.load_runtime().state,
            task_counts: task_counts(scope),
            open_tasks,
            members,
            open_messages: scope.messages().open_messages(None).len(),
            last_event_id: recent_events.last().map_or(0, |e| e.id),
            recent_events,
        };
        scope
            .store()
            .save_json(&scope.paths().handoff(&handoff.handoff_id), &handoff)?;

        scope.emit(EventKind::HandoffCreated {
            by: created_by.to_string(),
            handoff: handoff.handoff_id.clone(),
        })?;
        info!("Created handoff {} for team {}", handoff.handoff_id, scope.id());
        Ok(handoff)
    }

    /// Newest handoff with what changed since, `None` before the first one
    pub fn latest_handoff(&self) -> FleetResult<Option<HandoffView>> {
        let scope = self.scope;
        let Some(handoff_id) = self.handoff_ids()?.pop() else {
            return Ok(None);
        };
        let Some(handoff) = scope
            .store()
            .try_load_json::<Handoff>(&scope.paths().handoff(&handoff_id))?
        else {
            return Ok(None);
        };

        let now_counts = task_counts(scope);
        let task_delta = now_counts
            .iter()
            .map(|(status, &count)| {
                let before = handoff.task_counts.get(status).copied().unwrap_or(0);
                (status.clone(), count as i64 - before as i64)
            })
            .filter(|(_, delta)| *delta != 0)
            .collect();

        let mut events_since: Vec<Event> = scope
            .events()
            .all()
            .into_iter()
            .filter(|e| e.id > handoff.last_event_id)
            .collect();
        let skip = events_since.len().saturating_sub(HANDOFF_FOLLOWUP_EVENTS);
        events_since.drain(..skip);

        Ok(Some(HandoffView {
            handoff,
            task_delta,
            events_since,
        }))
    }

    /// Handoff ids, oldest first
    fn handoff_ids(&self) -> FleetResult<Vec<String>> {
        let dir = self.scope.paths().handoffs_dir();
        let mut ids: Vec<String> = self
            .scope
            .store()
            .list(&dir)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(".json").map(str::to_string))
            .filter(|name| name.starts_with("handoff-"))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Timestamped id, bumped by a millisecond until it is free
    fn next_handoff_id(&self) -> String {
        let store = self.scope.store();
        let mut at = self.scope.now();
        loop {
            let id = format!("handoff-{}", at.format(HANDOFF_STAMP));
            if !store.exists(&self.scope.paths().handoff(&id)) {
                return id;
            }
            at += Duration::milliseconds(1);
        }
    }
}
