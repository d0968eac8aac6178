//! Read-only team diagnostics

use super::Recovery;
use crate::error::FleetResult;
use crate::paths::terminals;
use crate::tasks::refresh_board;
use crate::team::{MemberKind, SessionRecord};
use fleet_store::StoreExt;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Pass,
    Warn,
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    HostSession,
    PaneBinding,
    SessionBinding,
    MissingClaim,
    ClaimOwnerMismatch,
    OrphanClaim,
    ExpiredClaim,
    Cursor,
    BlockedDrift,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Finding {
    pub fn pass(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Pass,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warn(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warn,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorReport {
    pub team_id: String,
    pub status: Severity,
    pub findings: Vec<Finding>,
}

impl DoctorReport {
    pub fn is_ok(&self) -> bool {
        self.status == Severity::Pass
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warn)
    }
}

impl Recovery<'_> {
    /// Compare documents with each other and with the host. Never writes.
    pub fn doctor(&self) -> FleetResult<DoctorReport> {
        let scope = self.scope();
        let store = scope.store();
        let host = scope.fleet().host();
        let now = scope.now();
        let team = scope.load_team()?;
        let mut findings = Vec::new();

        let session = scope.host_session();
        let session_live = host.has_session(&session);
        findings.push(if session_live {
            Finding::pass(FindingKind::HostSession, format!("Host session {} is running", session))
        } else {
            Finding::warn(FindingKind::HostSession, format!("Host session {} is not running", session))
                .with_hint("Run 'fleet team start' or 'fleet team recover'")
        });

        let panes: BTreeSet<String> = if session_live {
            host.list_panes(&session)
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.pane_id)
                .collect()
        } else {
            BTreeSet::new()
        };

        let mut binding_issues = 0;
        for member in team.members.iter().filter(|m| !m.is_dormant()) {
            match member.kind() {
                MemberKind::Pane => match member.pane_id() {
                    Some(pane) if panes.contains(pane) => {}
                    Some(pane) => {
                        binding_issues += 1;
                        findings.push(
                            Finding::warn(
                                FindingKind::PaneBinding,
                                format!("{}: pane {} is gone", member.member_id, pane),
                            )
                            .with_hint("Run 'fleet team auto-heal'"),
                        );
                    }
                    None => {
                        binding_issues += 1;
                        findings.push(
                            Finding::warn(
                                FindingKind::PaneBinding,
                                format!("{}: no pane has been spawned", member.member_id),
                            )
                            .with_hint(format!("Run 'fleet member spawn {}'", member.member_id)),
                        );
                    }
                },
                MemberKind::Session => {
                    if let Some(sid) = member.session_id() {
                        let record: Option<SessionRecord> =
                            store.try_load_json(&terminals::session(sid)).unwrap_or(None);
                        if record.is_none() {
                            binding_issues += 1;
                            findings.push(Finding::warn(
                                FindingKind::SessionBinding,
                                format!("{}: session {} has no registry record", member.member_id, sid),
                            ));
                        }
                    }
                }
                MemberKind::Worker => {}
            }
        }
        if binding_issues == 0 {
            findings.push(Finding::pass(FindingKind::PaneBinding, "Every member binding is live"));
        }

        let board = scope.tasks().board();
        let claim_ids: BTreeSet<String> = scope.tasks().claim_files()?.into_iter().collect();
        let mut claim_issues = 0;

        for task in board.tasks.iter().filter(|t| t.status.is_owned()) {
            match scope.tasks().claim_of(&task.task_id) {
                None => {
                    claim_issues += 1;
                    findings.push(
                        Finding::warn(
                            FindingKind::MissingClaim,
                            format!("{} is {} without a claim file", task.task_id, task.status),
                        )
                        .with_hint("A heartbeat from the owner recreates the lease"),
                    );
                }
                Some(claim) if task.claimed_by.as_deref() != Some(claim.claimed_by.as_str()) => {
                    claim_issues += 1;
                    findings.push(Finding::warn(
                        FindingKind::ClaimOwnerMismatch,
                        format!(
                            "{} is owned by {} but its claim names {}",
                            task.task_id,
                            task.claimed_by.as_deref().unwrap_or("nobody"),
                            claim.claimed_by
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        for task_id in &claim_ids {
            let owned = board.get(task_id).is_some_and(|t| t.status.is_owned());
            if !owned {
                claim_issues += 1;
                findings.push(
                    Finding::warn(
                        FindingKind::OrphanClaim,
                        format!("Claim file for {} has no owned task", task_id),
                    )
                    .with_hint("Run 'fleet team gc'"),
                );
            } else if scope
                .tasks()
                .claim_of(task_id)
                .is_some_and(|c| c.is_expired_at(now))
            {
                claim_issues += 1;
                findings.push(
                    Finding::warn(
                        FindingKind::ExpiredClaim,
                        format!("Lease on {} has expired but was not swept", task_id),
                    )
                    .with_hint("Run 'fleet team reconcile'"),
                );
            }
        }
        if claim_issues == 0 {
            findings.push(Finding::pass(
                FindingKind::MissingClaim,
                format!("{} claims match their tasks", claim_ids.len()),
            ));
        }

        let cursors = store.list(&scope.paths().cursors_dir())?;
        let mut cursor_issues = 0;
        for name in &cursors {
            let key = format!("{}/{}", scope.paths().cursors_dir(), name);
            let parses = store
                .read(&key)?
                .is_some_and(|raw| raw.trim().parse::<u64>().is_ok());
            if !parses {
                cursor_issues += 1;
                findings.push(
                    Finding::warn(FindingKind::Cursor, format!("Cursor {} is unparseable", name))
                        .with_hint("It reads as 0; the consumer will replay the log"),
                );
            }
        }
        if cursor_issues == 0 {
            findings.push(Finding::pass(
                FindingKind::Cursor,
                format!("{} cursors parse", cursors.len()),
            ));
        }

        let mut scratch = board.clone();
        let drift = refresh_board(&mut scratch);
        findings.push(if drift.is_empty() {
            Finding::pass(FindingKind::BlockedDrift, "Blocked state matches dependencies")
        } else {
            Finding::warn(
                FindingKind::BlockedDrift,
                format!("Blocked state is stale for: {}", drift.join(", ")),
            )
            .with_hint("Run 'fleet team reconcile'")
        });

        let status = if findings.iter().any(|f| f.severity == Severity::Warn) {
            Severity::Warn
        } else {
            Severity::Pass
        };
        Ok(DoctorReport {
            team_id: scope.id().to_string(),
            status,
            findings,
        })
    }
}
