//! Event payloads

use crate::messaging::{ChannelType, DeliveryChannel};
use crate::scaling::{Decision, Preset};
use crate::tasks::TaskStatus;
use crate::team::{MemberKind, Presence, Role};
use serde::{Deserialize, Serialize};

/// Channel used to interrupt a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptMode {
    /// Keystrokes sent to the hosted pane
    Pane,
    /// SIGINT to the tracked process
    Signal,
    /// High-priority notice in the live inbox
    Inbox,
    /// High-priority notice queued in the mailbox
    Mailbox,
}

/// Every domain event the engine emits, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum EventKind {
    TeamCreated {
        team_id: String,
        name: String,
        lead: String,
    },
    TeamStarted {
        host_session: String,
    },
    TeamStopped {
        killed_session: bool,
    },
    TeamResumed {
        repaired_members: Vec<String>,
    },
    TeamReconciled {
        expired_claims: usize,
        compacted_events: usize,
        bridged_workers: usize,
    },
    TeamBootstrapped {
        preset: Preset,
        source: String,
        budget_pct: Option<f64>,
    },
    TeamRecovered {
        hard: bool,
        doctor_ok: bool,
    },
    TeamTeardown {
        summary: String,
        stopped_members: Vec<String>,
    },
    TeamArchived {
        archive: String,
    },
    AutoRecoverTriggered {
        reason: String,
        doctor_ok: bool,
        recent_failures: usize,
        recent_restarts: usize,
    },
    AutoRecoverFailed {
        detail: String,
    },
    HandoffCreated {
        by: String,
        handoff: String,
    },
    OwnershipUpdated {
        owners: Vec<String>,
        escalation: Vec<String>,
        project: Option<String>,
    },
    OperatorPresenceChanged {
        member_id: String,
        from: Option<Presence>,
        to: Presence,
    },
    TeammateJoined {
        member_id: String,
        kind: MemberKind,
        role: Role,
    },
    TeammateAttached {
        member_id: String,
        session_id: String,
        flushed: usize,
    },
    TeammateSpawned {
        member_id: String,
        pane_id: String,
        host_session: String,
    },
    TeammateInterrupted {
        member_id: String,
        mode: InterruptMode,
        message: Option<String>,
    },
    TeammateRestarted {
        member_id: String,
        resumed_tasks: Vec<String>,
        respawned: bool,
    },
    TeammateReplaced {
        old_member_id: String,
        new_member_id: String,
        transferred_tasks: Vec<String>,
        transferred_workers: usize,
    },
    TeammatePaused {
        member_id: String,
    },
    TeammateResumed {
        member_id: String,
    },
    TeammateStopped {
        member_id: String,
    },
    TeammateIdle {
        member_id: String,
        idle_seconds: i64,
    },
    TeammateClosed {
        member_id: String,
    },
    TeammateHealed {
        member_id: String,
        pane_id: String,
    },
    TaskAdded {
        task_id: String,
        title: String,
        depends_on: Vec<String>,
        status: TaskStatus,
    },
    TaskClaimed {
        task_id: String,
        member_id: String,
        force: bool,
        previous_owner: Option<String>,
    },
    TaskUpdated {
        task_id: String,
        status: TaskStatus,
        previous_status: TaskStatus,
        by: Option<String>,
    },
    TaskCompleted {
        task_id: Option<String>,
        by: Option<String>,
        worker_task_id: Option<String>,
    },
    TaskClaimReleased {
        task_id: String,
        previous_owner: String,
        by: String,
    },
    TaskClaimExpired {
        task_id: String,
        previous_owner: String,
    },
    TaskWorkerRegistered {
        worker_task_id: String,
        task_id: Option<String>,
        member_id: Option<String>,
        auto_complete: bool,
    },
    TaskWorkerAttached {
        worker_task_id: String,
        status: String,
    },
    TaskWorkerFinished {
        worker_task_id: String,
        task_id: Option<String>,
        status: String,
        summary: Option<String>,
    },
    PeerMessageDelivered {
        message_id: String,
        from_member: String,
        to_member: String,
        channel: DeliveryChannel,
        retry_count: u32,
    },
    PeerMessageQueued {
        message_id: String,
        from_member: String,
        to_member: String,
        channel: DeliveryChannel,
        retry_count: u32,
    },
    PeerMessageAcknowledged {
        message_id: String,
        member_id: String,
    },
    BroadcastSent {
        message_id: String,
        from_member: String,
        channel_type: ChannelType,
        delivered: usize,
        queued: usize,
    },
    CoordinationEscalated {
        to_member: String,
        stale_messages: usize,
        blocked_tasks: usize,
        idle_members: Vec<String>,
    },
    AutoScaleDecision {
        decision: Decision,
        target: Option<Preset>,
        reason: String,
        queue_depth: usize,
        budget_pct: f64,
        failure_rate_24h: usize,
        applied: bool,
    },
    PresetApplied {
        preset: Preset,
        added: Vec<String>,
        paused: Vec<String>,
        stopped: Vec<String>,
        resumed: Vec<String>,
    },
}

/// Event types pushed to agent sessions by the session-events hook
pub const SESSION_EVENT_TYPES: [&str; 5] = [
    "TeammateIdle",
    "TaskCompleted",
    "TaskClaimed",
    "PeerMessageDelivered",
    "TeammateInterrupted",
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_with_type_tag_and_camel_case() {
        let kind = EventKind::TaskClaimExpired {
            task_id: "T1".to_string(),
            previous_owner: "coder-1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&kind).unwrap(),
            json!({"type": "TaskClaimExpired", "taskId": "T1", "previousOwner": "coder-1"})
        );
    }

    #[test]
    fn test_parses_back() {
        let value = json!({
            "type": "TeammateInterrupted",
            "memberId": "coder-1",
            "mode": "signal",
            "message": null
        });
        let kind: EventKind = serde_json::from_value(value).unwrap();
        assert!(matches!(
            kind,
            EventKind::TeammateInterrupted {
                mode: InterruptMode::Signal,
                ..
            }
        ));
    }
}
