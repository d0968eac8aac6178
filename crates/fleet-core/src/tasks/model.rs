//! Task, history and claim documents

use crate::messaging::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Blocked,
    Claimed,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        Self::Pending,
        Self::Blocked,
        Self::Claimed,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Completed and cancelled tasks are never re-evaluated
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses that hold an owner and a lease
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Claimed | Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::Claimed => "claimed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown task status: {}", s))
    }
}

/// Audit entry appended to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub action: String,
    pub by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_owner: Option<String>,
}

/// A unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Canonical absolute paths
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Task {
    pub(crate) fn record(
        &mut self,
        now: DateTime<Utc>,
        action: impl Into<String>,
        by: impl Into<String>,
        note: Option<String>,
        previous_owner: Option<String>,
    ) {
        self.history.push(HistoryEntry {
            ts: now,
            action: action.into(),
            by: by.into(),
            note,
            previous_owner,
        });
        self.updated_at = now;
    }

    pub(crate) fn clear_owner(&mut self) -> Option<String> {
        self.claimed_at = None;
        self.claimed_by.take()
    }
}

/// `tasks.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskBoard {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn get_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.task_id == task_id)
    }

    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.get(task_id).map(|t| t.status)
    }

    /// Dependencies of `task` that are not completed (unknown ids count as unmet)
    pub fn unmet_dependencies(&self, task: &Task) -> Vec<String> {
        task.depends_on
            .iter()
            .filter(|dep| self.status_of(dep) != Some(TaskStatus::Completed))
            .cloned()
            .collect()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

/// Lease status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Active,
    Expired,
}

/// Time-bounded ownership of a task, stored in `claims/<task>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub task_id: String,
    pub claimed_by: String,
    pub claimed_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<String>,
    pub ttl_seconds: u64,
    pub heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub force_claim: bool,
    #[serde(default)]
    pub previous_owner: Option<String>,
    pub status: ClaimStatus,
}

impl Claim {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ClaimStatus::Expired || self.expires_at <= now
    }

    /// Push the lease forward from `now`
    pub fn renew(&mut self, now: DateTime<Utc>) {
        self.heartbeat_at = now;
        self.expires_at = now + chrono::Duration::seconds(self.ttl_seconds as i64);
        self.status = ClaimStatus::Active;
    }
}

/// A file overlap with another owned task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConflict {
    pub task_id: String,
    pub owner: Option<String>,
    pub age_seconds: Option<i64>,
    pub files: Vec<String>,
}

impl fmt::Display for FileConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = self.owner.as_deref().unwrap_or("unowned");
        match self.age_seconds {
            Some(age) => write!(f, "{} ({}, age={}s): {}", self.task_id, owner, age, self.files.join(", ")),
            None => write!(f, "{} ({}): {}", self.task_id, owner, self.files.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_names() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_claim_expiry_boundary() {
        let now = Utc::now();
        let mut claim = Claim {
            task_id: "T1".to_string(),
            claimed_by: "coder-1".to_string(),
            claimed_at: now,
            files: vec![],
            ttl_seconds: 5,
            heartbeat_at: now,
            expires_at: now + chrono::Duration::seconds(5),
            force_claim: false,
            previous_owner: None,
            status: ClaimStatus::Active,
        };
        assert!(!claim.is_expired_at(now + chrono::Duration::seconds(4)));
        assert!(claim.is_expired_at(now + chrono::Duration::seconds(5)));

        claim.renew(now + chrono::Duration::seconds(4));
        assert!(!claim.is_expired_at(now + chrono::Duration::seconds(6)));
    }

    #[test]
    fn test_file_conflict_display() {
        let conflict = FileConflict {
            task_id: "T1".to_string(),
            owner: Some("coder-1".to_string()),
            age_seconds: Some(42),
            files: vec!["/repo/x.go".to_string()],
        };
        assert_eq!(conflict.to_string(), "T1 (coder-1, age=42s): /repo/x.go");
    }
}
