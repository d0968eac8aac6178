//! Task ledger and lease protocol
//!
//! Every check-then-act mutation runs inside the team's tasks lock, which also
//! covers the claim files. Claim writes and events are staged while the board
//! is edited and applied only once `tasks.json` is saved, still under the lock.

use super::model::{
    Claim, ClaimStatus, FileConflict, Task, TaskBoard, TaskStatus,
};
use crate::error::{FleetError, FleetResult};
use crate::events::EventKind;
use crate::ids::{canonical_path, validate_id};
use crate::messaging::Priority;
use crate::team::TeamScope;
use chrono::Duration;
use fleet_store::StoreExt;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const RUNTIME_ACTOR: &str = "runtime";

/// Input for [`TaskLedger::add`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Explicit id; `T<n>` when absent
    pub task_id: Option<String>,
    pub title: String,
    pub description: String,
    pub depends_on: Vec<String>,
    pub files: Vec<String>,
    pub priority: Priority,
    pub created_by: Option<String>,
}

/// Result of a successful claim
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub task: Task,
    pub claim: Claim,
    /// Overlaps accepted because of `force`
    pub conflicts: Vec<FileConflict>,
}

/// A lease that the expiry sweep reclaimed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredClaim {
    pub task_id: String,
    pub previous_owner: String,
}

/// Task operations of one team
pub struct TaskLedger<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> TaskLedger<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    fn load_board(&self) -> TaskBoard {
        self.scope.store().load_json(&self.scope.paths().tasks())
    }

    fn save_board(&self, board: &TaskBoard) -> FleetResult<()> {
        self.scope
            .store()
            .save_json(&self.scope.paths().tasks(), board)?;
        Ok(())
    }

    fn load_claim(&self, task_id: &str) -> Option<Claim> {
        let key = self.scope.paths().claim(task_id);
        match self.scope.store().try_load_json::<Claim>(&key) {
            Ok(claim) => claim,
            Err(e) => {
                warn!("Unreadable claim {}: {}", key, e);
                None
            }
        }
    }

    fn save_claim(&self, claim: &Claim) -> FleetResult<()> {
        self.scope
            .store()
            .save_json(&self.scope.paths().claim(&claim.task_id), claim)?;
        Ok(())
    }

    fn delete_claim(&self, task_id: &str) -> FleetResult<bool> {
        Ok(self
            .scope
            .store()
            .remove(&self.scope.paths().claim(task_id))?)
    }

    /// Run `f` on the task board under the tasks lock and persist it.
    ///
    /// Effects staged by `f` are applied in order after the board is saved; a
    /// failed save leaves claims and the event log untouched.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut TaskBoard, &mut Effects) -> FleetResult<R>,
    ) -> FleetResult<R> {
        let store = self.scope.store();
        store.with_lock(&self.scope.paths().tasks_lock(), || {
            let mut board = self.load_board();
            let mut effects = Effects::default();
            let out = f(&mut board, &mut effects)?;
            self.save_board(&board)?;
            self.apply(effects)?;
            Ok(out)
        })
    }

    fn apply(&self, effects: Effects) -> FleetResult<()> {
        for effect in effects.0 {
            match effect {
                Effect::SaveClaim(claim) => self.save_claim(&claim)?,
                Effect::DeleteClaim(task_id) => {
                    self.delete_claim(&task_id)?;
                }
                Effect::Emit(kind) => {
                    self.scope.emit(kind)?;
                }
            }
        }
        Ok(())
    }

    fn require_member(&self, member_id: &str) -> FleetResult<()> {
        validate_id("member id", member_id)?;
        let team = self.scope.load_team()?;
        if team.member(member_id).is_none() {
            return Err(FleetError::not_found("Member", member_id));
        }
        Ok(())
    }

    fn new_lease(&self, task: &Task, member_id: &str, ttl: u64, force: bool, previous_owner: Option<String>) -> Claim {
        let now = self.scope.now();
        Claim {
            task_id: task.task_id.clone(),
            claimed_by: member_id.to_string(),
            claimed_at: task.claimed_at.unwrap_or(now),
            files: task.files.clone(),
            ttl_seconds: ttl,
            heartbeat_at: now,
            expires_at: now + Duration::seconds(ttl as i64),
            force_claim: force,
            previous_owner,
            status: ClaimStatus::Active,
        }
    }

    /// Create a task. Status is `blocked` when any dependency is not completed.
    pub fn add(&self, new: NewTask) -> FleetResult<Task> {
        if new.title.trim().is_empty() {
            return Err(FleetError::validation_field("Task title must not be empty", "title"));
        }
        if let Some(id) = &new.task_id {
            validate_id("task id", id)?;
        }
        for dep in &new.depends_on {
            validate_id("dependency id", dep)?;
        }
        if let Some(creator) = &new.created_by {
            validate_id("member id", creator)?;
        }

        let base = self.scope.fleet().workdir().clone();
        let files: Vec<String> = new
            .files
            .iter()
            .map(|f| canonical_path(f, &base))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let depends_on: Vec<String> = new
            .depends_on
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.mutate(|board, effects| {
            let task_id = match new.task_id.clone() {
                Some(id) => id,
                None => next_task_id(board),
            };
            if board.get(&task_id).is_some() {
                return Err(FleetError::conflict(format!("Task {} already exists", task_id)));
            }
            if depends_on.contains(&task_id) {
                return Err(FleetError::validation(format!("Task {} cannot depend on itself", task_id)));
            }
            let missing: Vec<&String> = depends_on.iter().filter(|d| board.get(d).is_none()).collect();
            if !missing.is_empty() {
                return Err(FleetError::validation_field(
                    format!(
                        "Unknown dependencies: {}",
                        missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                    "depends_on",
                ));
            }

            let now = self.scope.now();
            let mut task = Task {
                task_id: task_id.clone(),
                title: new.title.trim().to_string(),
                description: new.description.clone(),
                status: TaskStatus::Pending,
                priority: new.priority,
                depends_on: depends_on.clone(),
                files: files.clone(),
                claimed_by: None,
                claimed_at: None,
                created_by: new.created_by.clone(),
                created_at: now,
                updated_at: now,
                history: Vec::new(),
            };
            if !board.unmet_dependencies(&task).is_empty() {
                task.status = TaskStatus::Blocked;
            }
            task.record(
                now,
                "created",
                new.created_by.as_deref().unwrap_or(RUNTIME_ACTOR),
                None,
                None,
            );
            board.tasks.push(task.clone());

            effects.emit(EventKind::TaskAdded {
                task_id: task.task_id.clone(),
                title: task.title.clone(),
                depends_on: task.depends_on.clone(),
                status: task.status,
            });
            info!("Added task {} ({}) to team {}", task.task_id, task.status, self.scope.id());
            Ok(task)
        })
    }

    /// Tasks, optionally filtered by status and owner
    pub fn list(&self, status: Option<TaskStatus>, owner: Option<&str>) -> Vec<Task> {
        self.load_board()
            .tasks
            .into_iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .filter(|t| owner.is_none_or(|o| t.claimed_by.as_deref() == Some(o)))
            .collect()
    }

    pub fn get(&self, task_id: &str) -> FleetResult<Task> {
        self.load_board()
            .get(task_id)
            .cloned()
            .ok_or_else(|| FleetError::not_found("Task", task_id))
    }

    pub fn board(&self) -> TaskBoard {
        self.load_board()
    }

    /// Active lease of a task, if any
    pub fn claim_of(&self, task_id: &str) -> Option<Claim> {
        self.load_claim(task_id)
    }

    /// Task ids that currently have a claim file
    pub fn claim_files(&self) -> FleetResult<Vec<String>> {
        Ok(self
            .scope
            .store()
            .list(&self.scope.paths().claims_dir())?
            .into_iter()
            .filter_map(|name| name.strip_suffix(".json").map(str::to_string))
            .collect())
    }

    /// Tasks this member owns in `claimed`/`in_progress`
    pub fn owned_by(&self, member_id: &str) -> Vec<Task> {
        self.load_board()
            .tasks
            .into_iter()
            .filter(|t| t.status.is_owned() && t.claimed_by.as_deref() == Some(member_id))
            .collect()
    }

    /// Take ownership of a task under a fresh lease.
    ///
    /// Rejected without `force` when a dependency is unmet, another member owns
    /// the task, the member is paused, or its files overlap another owned task.
    pub fn claim(
        &self,
        task_id: &str,
        member_id: &str,
        ttl: Option<u64>,
        force: bool,
    ) -> FleetResult<ClaimOutcome> {
        validate_id("task id", task_id)?;
        self.require_member(member_id)?;
        let team = self.scope.load_team()?;
        let member_status = team.member(member_id).map(|m| m.status);
        let ttl = ttl.unwrap_or(self.scope.fleet().config().claim_ttl_secs);
        if ttl == 0 {
            return Err(FleetError::validation_field("Claim TTL must be positive", "ttl"));
        }

        self.mutate(|board, effects| {
            let now = self.scope.now();
            let task = board
                .get(task_id)
                .cloned()
                .ok_or_else(|| FleetError::not_found("Task", task_id))?;

            if task.status.is_terminal() {
                return Err(FleetError::conflict(format!(
                    "Task {} is already {}",
                    task_id, task.status
                )));
            }
            if !force {
                if let Some(status) = member_status.filter(|s| s.is_dormant()) {
                    return Err(FleetError::conflict(format!(
                        "Member {} is {}",
                        member_id, status
                    )));
                }
                let unmet = board.unmet_dependencies(&task);
                if !unmet.is_empty() {
                    return Err(FleetError::conflict_with_context(
                        format!("Task {} is blocked by: {}", task_id, unmet.join(", ")),
                        "complete the dependencies or claim with force",
                    ));
                }
                if let Some(owner) = task.claimed_by.as_deref() {
                    if owner != member_id && task.status.is_owned() {
                        return Err(FleetError::conflict(format!(
                            "Task {} already claimed by {}",
                            task_id, owner
                        )));
                    }
                }
            }

            let conflicts = file_conflicts(board, &task, now);
            if !conflicts.is_empty() && !force {
                return Err(file_conflict_error(task_id, &conflicts));
            }

            let previous_owner = task
                .claimed_by
                .clone()
                .filter(|owner| owner != member_id);
            let mut note_parts = Vec::new();
            if force {
                note_parts.push("force=true".to_string());
            }
            if !conflicts.is_empty() {
                let listed: Vec<String> = conflicts.iter().map(ToString::to_string).collect();
                note_parts.push(format!("conflicts: {}", listed.join("; ")));
            }
            let note = (!note_parts.is_empty()).then(|| note_parts.join("; "));

            let task = board
                .get_mut(task_id)
                .ok_or_else(|| FleetError::not_found("Task", task_id))?;
            if task.claimed_by.as_deref() != Some(member_id) {
                task.claimed_at = Some(now);
            }
            task.claimed_by = Some(member_id.to_string());
            if task.status != TaskStatus::InProgress {
                task.status = TaskStatus::Claimed;
            }
            task.record(now, "claimed", member_id, note, previous_owner.clone());
            let task = task.clone();

            let claim = self.new_lease(&task, member_id, ttl, force, previous_owner.clone());
            effects.save_claim(claim.clone());
            effects.emit(EventKind::TaskClaimed {
                task_id: task_id.to_string(),
                member_id: member_id.to_string(),
                force,
                previous_owner,
            });
            info!("Task {} claimed by {} (force={})", task_id, member_id, force);
            Ok(ClaimOutcome {
                task,
                claim,
                conflicts,
            })
        })
    }

    /// Move a task through the state machine
    pub fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        member_id: Option<&str>,
        note: Option<String>,
        force: bool,
    ) -> FleetResult<Task> {
        validate_id("task id", task_id)?;
        if let Some(member) = member_id {
            self.require_member(member)?;
        }

        self.mutate(|board, effects| {
            let now = self.scope.now();
            let current = board
                .get(task_id)
                .cloned()
                .ok_or_else(|| FleetError::not_found("Task", task_id))?;
            let previous_status = current.status;

            if previous_status.is_terminal() && !force && status != previous_status {
                return Err(FleetError::conflict(format!(
                    "Task {} is already {}",
                    task_id, previous_status
                )));
            }

            let mut new_owner = None;
            if status.is_owned() {
                let owner = match (current.claimed_by.as_deref(), member_id) {
                    (Some(owner), Some(member)) if owner != member && !force => {
                        return Err(FleetError::conflict(format!(
                            "Task {} already claimed by {}",
                            task_id, owner
                        )));
                    }
                    (_, Some(member)) => member.to_string(),
                    (Some(owner), None) => owner.to_string(),
                    (None, None) => {
                        return Err(FleetError::validation(format!(
                            "Task {} has no owner; pass a member to mark it {}",
                            task_id, status
                        )));
                    }
                };
                let unmet = board.unmet_dependencies(&current);
                if !unmet.is_empty() && !force {
                    return Err(FleetError::conflict(format!(
                        "Task {} is blocked by: {}",
                        task_id,
                        unmet.join(", ")
                    )));
                }
                if !previous_status.is_owned() && !force {
                    let conflicts = file_conflicts(board, &current, now);
                    if !conflicts.is_empty() {
                        return Err(file_conflict_error(task_id, &conflicts));
                    }
                }
                new_owner = Some(owner);
            }

            let actor = member_id
                .map(str::to_string)
                .or_else(|| current.claimed_by.clone())
                .unwrap_or_else(|| RUNTIME_ACTOR.to_string());

            let task = board
                .get_mut(task_id)
                .ok_or_else(|| FleetError::not_found("Task", task_id))?;
            task.status = status;
            task.record(now, format!("status:{}", status), actor.clone(), note, None);

            match new_owner {
                Some(owner) => {
                    let owner_changed = task.claimed_by.as_deref() != Some(owner.as_str());
                    if owner_changed {
                        task.claimed_by = Some(owner.clone());
                        task.claimed_at = Some(now);
                    }
                    let task = task.clone();
                    let ttl = self
                        .load_claim(task_id)
                        .filter(|c| !owner_changed && c.claimed_by == owner)
                        .map(|c| c.ttl_seconds)
                        .unwrap_or(self.scope.fleet().config().claim_ttl_secs);
                    effects.save_claim(self.new_lease(&task, &owner, ttl, force, None));
                }
                None => {
                    task.clear_owner();
                    effects.delete_claim(task_id);
                }
            }

            refresh_board(board);
            let task = board
                .get(task_id)
                .cloned()
                .ok_or_else(|| FleetError::not_found("Task", task_id))?;

            effects.emit(EventKind::TaskUpdated {
                task_id: task_id.to_string(),
                status: task.status,
                previous_status,
                by: Some(actor.clone()),
            });
            if task.status == TaskStatus::Completed && previous_status != TaskStatus::Completed {
                effects.emit(EventKind::TaskCompleted {
                    task_id: Some(task_id.to_string()),
                    by: Some(actor),
                    worker_task_id: None,
                });
            }
            info!("Task {}: {} -> {}", task_id, previous_status, task.status);
            Ok(task)
        })
    }

    /// Give up ownership; owned tasks go back to `pending`
    pub fn release(&self, task_id: &str, member_id: &str, force: bool) -> FleetResult<Task> {
        validate_id("task id", task_id)?;
        validate_id("member id", member_id)?;

        self.mutate(|board, effects| {
            let now = self.scope.now();
            let task = board
                .get_mut(task_id)
                .ok_or_else(|| FleetError::not_found("Task", task_id))?;
            let owner = task
                .claimed_by
                .clone()
                .ok_or_else(|| FleetError::conflict(format!("Task {} is not claimed", task_id)))?;
            if owner != member_id && !force {
                return Err(FleetError::conflict(format!(
                    "Task {} is claimed by {}, not {}",
                    task_id, owner, member_id
                )));
            }

            task.clear_owner();
            if task.status.is_owned() {
                task.status = TaskStatus::Pending;
            }
            task.record(now, "claim_released", member_id, None, Some(owner.clone()));
            effects.delete_claim(task_id);
            refresh_board(board);

            effects.emit(EventKind::TaskClaimReleased {
                task_id: task_id.to_string(),
                previous_owner: owner,
                by: member_id.to_string(),
            });
            board
                .get(task_id)
                .cloned()
                .ok_or_else(|| FleetError::not_found("Task", task_id))
        })
    }

    /// Re-derive blocked/pending for every non-terminal task; returns changed ids
    pub fn refresh_blocked(&self) -> FleetResult<Vec<String>> {
        self.mutate(|board, _| Ok(refresh_board(board)))
    }

    /// Reclaim leases whose `expiresAt` has passed.
    ///
    /// Expired claim files are deleted. A `claimed` task returns to `pending`;
    /// an `in_progress` task keeps its status but loses its owner.
    pub fn expire_stale_claims(&self) -> FleetResult<Vec<ExpiredClaim>> {
        self.mutate(|board, effects| {
            let now = self.scope.now();
            let mut expired = Vec::new();

            for task_id in self.claim_files()? {
                let Some(claim) = self.load_claim(&task_id) else {
                    continue;
                };
                if !claim.is_expired_at(now) {
                    continue;
                }
                effects.delete_claim(&task_id);

                let Some(task) = board.get_mut(&task_id) else {
                    continue;
                };
                if !task.status.is_owned() || task.claimed_by.as_deref() != Some(claim.claimed_by.as_str()) {
                    continue;
                }

                task.clear_owner();
                if task.status == TaskStatus::Claimed {
                    task.status = TaskStatus::Pending;
                }
                task.record(
                    now,
                    "claim_expired",
                    RUNTIME_ACTOR,
                    None,
                    Some(claim.claimed_by.clone()),
                );
                expired.push(ExpiredClaim {
                    task_id: task_id.clone(),
                    previous_owner: claim.claimed_by.clone(),
                });
            }

            refresh_board(board);
            for item in &expired {
                effects.emit(EventKind::TaskClaimExpired {
                    task_id: item.task_id.clone(),
                    previous_owner: item.previous_owner.clone(),
                });
            }
            if !expired.is_empty() {
                info!("Expired {} claims in team {}", expired.len(), self.scope.id());
            }
            Ok(expired)
        })
    }

    /// Heartbeat renewal of every lease the member holds; returns renewed task ids
    pub fn renew_member_claims(&self, member_id: &str) -> FleetResult<Vec<String>> {
        validate_id("member id", member_id)?;
        let store = self.scope.store();
        store.with_lock(&self.scope.paths().tasks_lock(), || {
            let now = self.scope.now();
            let board = self.load_board();
            let mut renewed = Vec::new();
            for task in board
                .tasks
                .iter()
                .filter(|t| t.status.is_owned() && t.claimed_by.as_deref() == Some(member_id))
            {
                let mut claim = match self.load_claim(&task.task_id) {
                    Some(claim) if claim.claimed_by == member_id => claim,
                    _ => self.new_lease(
                        task,
                        member_id,
                        self.scope.fleet().config().claim_ttl_secs,
                        false,
                        None,
                    ),
                };
                claim.renew(now);
                self.save_claim(&claim)?;
                renewed.push(task.task_id.clone());
            }
            debug!("Renewed {} claims for {}", renewed.len(), member_id);
            Ok::<_, FleetError>(renewed)
        })
    }

    /// Move every owned task and lease from one member to another
    pub fn transfer_claims(&self, from: &str, to: &str) -> FleetResult<Vec<String>> {
        self.mutate(|board, effects| {
            let now = self.scope.now();
            let mut moved = Vec::new();
            for task in board
                .tasks
                .iter_mut()
                .filter(|t| t.status.is_owned() && t.claimed_by.as_deref() == Some(from))
            {
                task.claimed_by = Some(to.to_string());
                task.record(
                    now,
                    "claim_transferred",
                    RUNTIME_ACTOR,
                    Some(format!("{} -> {}", from, to)),
                    Some(from.to_string()),
                );

                let mut claim = self
                    .load_claim(&task.task_id)
                    .unwrap_or_else(|| {
                        self.new_lease(task, to, self.scope.fleet().config().claim_ttl_secs, false, None)
                    });
                claim.claimed_by = to.to_string();
                claim.previous_owner = Some(from.to_string());
                claim.renew(now);
                effects.save_claim(claim);
                moved.push(task.task_id.clone());
            }
            Ok(moved)
        })
    }
}

/// A write staged during a board mutation
enum Effect {
    SaveClaim(Claim),
    DeleteClaim(String),
    Emit(EventKind),
}

#[derive(Default)]
struct Effects(Vec<Effect>);

impl Effects {
    fn save_claim(&mut self, claim: Claim) {
        self.0.push(Effect::SaveClaim(claim));
    }

    fn delete_claim(&mut self, task_id: &str) {
        self.0.push(Effect::DeleteClaim(task_id.to_string()));
    }

    fn emit(&mut self, kind: EventKind) {
        self.0.push(Effect::Emit(kind));
    }
}

/// Apply the dependency rule to every non-terminal task; returns changed ids.
///
/// Owned tasks with unmet dependencies (forced claims) keep their status.
pub(crate) fn refresh_board(board: &mut TaskBoard) -> Vec<String> {
    let completed: BTreeSet<String> = board
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.task_id.clone())
        .collect();

    let mut changed = Vec::new();
    for task in board.tasks.iter_mut().filter(|t| !t.status.is_terminal()) {
        let met = task.depends_on.iter().all(|d| completed.contains(d));
        let next = match (met, task.status) {
            (false, TaskStatus::Pending) => TaskStatus::Blocked,
            (true, TaskStatus::Blocked) => TaskStatus::Pending,
            (_, current) => current,
        };
        if next != task.status {
            task.status = next;
            changed.push(task.task_id.clone());
        }
    }
    changed
}

/// Owned tasks (other than `task`) whose files intersect `task`'s files
fn file_conflicts(board: &TaskBoard, task: &Task, now: chrono::DateTime<chrono::Utc>) -> Vec<FileConflict> {
    if task.files.is_empty() {
        return Vec::new();
    }
    let wanted: BTreeSet<&String> = task.files.iter().collect();
    board
        .tasks
        .iter()
        .filter(|other| other.task_id != task.task_id && other.status.is_owned())
        .filter_map(|other| {
            let overlap: Vec<String> = other
                .files
                .iter()
                .filter(|f| wanted.contains(f))
                .cloned()
                .collect();
            (!overlap.is_empty()).then(|| FileConflict {
                task_id: other.task_id.clone(),
                owner: other.claimed_by.clone(),
                age_seconds: other.claimed_at.map(|at| (now - at).num_seconds()),
                files: overlap,
            })
        })
        .collect()
}

fn file_conflict_error(task_id: &str, conflicts: &[FileConflict]) -> FleetError {
    let listed: Vec<String> = conflicts.iter().map(ToString::to_string).collect();
    FleetError::conflict_with_context(
        format!("File claim conflict for task {}: {}", task_id, listed.join("; ")),
        "claim with force to override",
    )
}

fn next_task_id(board: &TaskBoard) -> String {
    let mut n = board.tasks.len() + 1;
    loop {
        let candidate = format!("T{}", n);
        if board.get(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(id: &str, status: TaskStatus, deps: &[&str]) -> Task {
        let now = Utc::now();
        Task {
            task_id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            status,
            priority: Priority::Normal,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            files: vec![],
            claimed_by: None,
            claimed_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
            history: vec![],
        }
    }

    #[test]
    fn test_refresh_board_applies_dependency_rule() {
        let mut board = TaskBoard {
            tasks: vec![
                task("A", TaskStatus::Completed, &[]),
                task("B", TaskStatus::Blocked, &["A"]),
                task("C", TaskStatus::Pending, &["D"]),
                task("D", TaskStatus::Pending, &[]),
                task("E", TaskStatus::Claimed, &["D"]),
                task("F", TaskStatus::Cancelled, &["D"]),
            ],
        };

        let changed = refresh_board(&mut board);
        assert_eq!(changed, vec!["B", "C"]);
        assert_eq!(board.status_of("B"), Some(TaskStatus::Pending));
        assert_eq!(board.status_of("C"), Some(TaskStatus::Blocked));
        // owned and terminal tasks are left alone
        assert_eq!(board.status_of("E"), Some(TaskStatus::Claimed));
        assert_eq!(board.status_of("F"), Some(TaskStatus::Cancelled));

        assert!(refresh_board(&mut board).is_empty());
    }

    #[test]
    fn test_file_conflicts_only_against_owned_tasks() {
        let now = Utc::now();
        let mut a = task("A", TaskStatus::InProgress, &[]);
        a.files = vec!["/repo/x.go".to_string(), "/repo/y.go".to_string()];
        a.claimed_by = Some("coder-1".to_string());
        a.claimed_at = Some(now - Duration::seconds(30));
        let mut idle = task("I", TaskStatus::Pending, &[]);
        idle.files = vec!["/repo/x.go".to_string()];
        let mut b = task("B", TaskStatus::Pending, &[]);
        b.files = vec!["/repo/x.go".to_string()];

        let board = TaskBoard {
            tasks: vec![a, idle, b.clone()],
        };
        let conflicts = file_conflicts(&board, &b, now);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].task_id, "A");
        assert_eq!(conflicts[0].files, vec!["/repo/x.go"]);
        assert_eq!(conflicts[0].age_seconds, Some(30));
    }

    #[test]
    fn test_next_task_id_skips_taken() {
        let board = TaskBoard {
            tasks: vec![task("T2", TaskStatus::Pending, &[])],
        };
        assert_eq!(next_task_id(&board), "T3");
        let board = TaskBoard {
            tasks: vec![task("T1", TaskStatus::Pending, &[])],
        };
        assert_eq!(next_task_id(&board), "T2");
    }
}
