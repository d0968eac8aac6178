//! Asynchronous worker bindings and their bridge into the event log

use crate::error::{FleetError, FleetResult};
use crate::events::EventKind;
use crate::ids::validate_id;
use crate::paths::terminals;
use crate::tasks::TaskStatus;
use crate::team::TeamScope;
use chrono::{DateTime, Utc};
use fleet_store::StoreExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const COMPLETED: &str = "completed";

/// Link between an external job and a task/member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerBinding {
    pub worker_task_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub auto_complete: bool,
    /// Completion already bridged into the event log
    #[serde(default)]
    pub reported: bool,
    pub registered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// `workers.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerBoard {
    #[serde(default)]
    pub workers: Vec<WorkerBinding>,
}

/// Result drop written when a job finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    pub status: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl WorkerResult {
    pub fn is_success(&self) -> bool {
        self.status == COMPLETED
    }
}

/// Worker bindings of one team
pub struct WorkerBridge<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> WorkerBridge<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    pub fn board(&self) -> WorkerBoard {
        self.scope.store().load_json(&self.scope.paths().workers())
    }

    fn save(&self, board: &WorkerBoard) -> FleetResult<()> {
        self.scope
            .store()
            .save_json(&self.scope.paths().workers(), board)?;
        Ok(())
    }

    /// Register a job; registering the same id again returns the existing binding
    pub fn register(
        &self,
        worker_task_id: &str,
        task_id: Option<&str>,
        member_id: Option<&str>,
        auto_complete: bool,
    ) -> FleetResult<WorkerBinding> {
        validate_id("worker task id", worker_task_id)?;
        if let Some(task_id) = task_id {
            self.scope.tasks().get(task_id)?;
        }
        if let Some(member_id) = member_id {
            let team = self.scope.load_team()?;
            if team.member(member_id).is_none() {
                return Err(FleetError::not_found("Member", member_id));
            }
        }

        let mut board = self.board();
        if let Some(existing) = board
            .workers
            .iter()
            .find(|w| w.worker_task_id == worker_task_id)
        {
            return Ok(existing.clone());
        }
        let binding = WorkerBinding {
            worker_task_id: worker_task_id.to_string(),
            task_id: task_id.map(str::to_string),
            member_id: member_id.map(str::to_string),
            auto_complete,
            reported: false,
            registered_at: self.scope.now(),
            reported_at: None,
            status: None,
        };
        board.workers.push(binding.clone());
        self.save(&board)?;

        self.scope.emit(EventKind::TaskWorkerRegistered {
            worker_task_id: binding.worker_task_id.clone(),
            task_id: binding.task_id.clone(),
            member_id: binding.member_id.clone(),
            auto_complete,
        })?;
        Ok(binding)
    }

    /// Drop a job's result for the next bridge pass
    pub fn attach_result(
        &self,
        worker_task_id: &str,
        status: &str,
        summary: Option<String>,
    ) -> FleetResult<WorkerResult> {
        validate_id("worker task id", worker_task_id)?;
        if !self
            .board()
            .workers
            .iter()
            .any(|w| w.worker_task_id == worker_task_id)
        {
            return Err(FleetError::not_found("Worker", worker_task_id));
        }
        let result = WorkerResult {
            status: status.to_string(),
            summary,
            finished_at: self.scope.now(),
        };
        self.scope
            .store()
            .save_json(&terminals::result(worker_task_id), &result)?;
        self.scope.emit(EventKind::TaskWorkerAttached {
            worker_task_id: worker_task_id.to_string(),
            status: status.to_string(),
        })?;
        Ok(result)
    }

    /// Turn finished, unreported jobs into events; returns how many were bridged
    pub fn bridge(&self) -> FleetResult<usize> {
        let mut board = self.board();
        let mut bridged = 0;
        let now = self.scope.now();

        for binding in board.workers.iter_mut().filter(|w| !w.reported) {
            let key = terminals::result(&binding.worker_task_id);
            let result: WorkerResult = match self.scope.store().try_load_json(&key) {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Unreadable worker result {}: {}", key, e);
                    continue;
                }
            };

            if result.is_success() {
                self.scope.emit(EventKind::TaskCompleted {
                    task_id: binding.task_id.clone(),
                    by: binding.member_id.clone(),
                    worker_task_id: Some(binding.worker_task_id.clone()),
                })?;
                if let (true, Some(task_id)) = (binding.auto_complete, &binding.task_id) {
                    let note = format!("Worker {} completed", binding.worker_task_id);
                    if let Err(e) = self.scope.tasks().update_status(
                        task_id,
                        TaskStatus::Completed,
                        binding.member_id.as_deref(),
                        Some(note),
                        false,
                    ) {
                        warn!("Auto-complete of {} failed: {}", task_id, e);
                    }
                }
            } else {
                self.scope.emit(EventKind::TaskWorkerFinished {
                    worker_task_id: binding.worker_task_id.clone(),
                    task_id: binding.task_id.clone(),
                    status: result.status.clone(),
                    summary: result.summary.clone(),
                })?;
            }

            binding.reported = true;
            binding.reported_at = Some(now);
            binding.status = Some(result.status);
            bridged += 1;
        }

        if bridged > 0 {
            self.save(&board)?;
            info!("Bridged {} worker results in team {}", bridged, self.scope.id());
        }
        Ok(bridged)
    }

    /// Rebind every job of `from` to `to`; returns the number moved
    pub fn transfer(&self, from: &str, to: &str) -> FleetResult<usize> {
        let mut board = self.board();
        let mut moved = 0;
        for binding in board
            .workers
            .iter_mut()
            .filter(|w| w.member_id.as_deref() == Some(from))
        {
            binding.member_id = Some(to.to_string());
            moved += 1;
        }
        if moved > 0 {
            self.save(&board)?;
        }
        Ok(moved)
    }
}
