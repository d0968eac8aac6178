//! Resume, reconcile, doctor, recover, auto-heal and auto-recover

mod doctor;

pub use doctor::{DoctorReport, Finding, FindingKind, Severity};

use crate::error::FleetResult;
use crate::events::EventKind;
use crate::lifecycle::SpawnOptions;
use crate::paths::terminals;
use crate::scaling::{is_failure, is_restart};
use crate::team::{Binding, MemberKind, MemberStatus, SessionRecord, TeamScope, TeamState};
use chrono::Duration;
use fleet_store::StoreExt;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeReport {
    pub host_session_live: bool,
    pub repaired_members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub expired_claims: usize,
    pub refreshed_tasks: usize,
    pub compacted_events: usize,
    pub bridged_workers: usize,
    pub escalated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverReport {
    pub resume: ResumeReport,
    pub reconcile: ReconcileReport,
    pub doctor: DoctorReport,
    pub healed: Vec<String>,
}

/// Failure events within the window above which the team counts as unhealthy
pub const RECOVER_FAILURES: usize = 3;
/// Restart events within the window above which the team counts as unhealthy
pub const RECOVER_RESTARTS: usize = 5;
/// Look-back window of the auto-recover health check
pub const RECOVER_WINDOW_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoRecoverAction {
    None,
    RecoverHard,
    RecoverHardFailed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRecoverReport {
    pub team_id: String,
    pub doctor_ok: bool,
    pub slo_breached: bool,
    pub recent_failures: usize,
    pub recent_restarts: usize,
    pub action: AutoRecoverAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recover: Option<RecoverReport>,
}

/// Recovery passes of one team
pub struct Recovery<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> Recovery<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    pub(crate) fn scope(&self) -> &'a TeamScope<'a> {
        self.scope
    }

    fn live_panes(&self) -> (bool, BTreeSet<String>) {
        let host = self.scope.fleet().host();
        let session = self.scope.host_session();
        if !host.has_session(&session) {
            return (false, BTreeSet::new());
        }
        let panes = match host.list_panes(&session) {
            Ok(panes) => panes.into_iter().map(|p| p.pane_id).collect(),
            Err(e) => {
                warn!("Could not list panes of {}: {}", session, e);
                BTreeSet::new()
            }
        };
        (true, panes)
    }

    /// Repair member bindings from current host and session facts
    pub fn resume(&self) -> FleetResult<ResumeReport> {
        let (live, panes) = self.live_panes();
        let store = self.scope.store();
        let now = self.scope.now();

        let repaired = self.scope.update_team(|team| {
            let mut repaired = Vec::new();
            for member in team.members.iter_mut().filter(|m| !m.is_dormant()) {
                let changed = match &mut member.binding {
                    Binding::Pane {
                        pane_id: Some(pane),
                        ..
                    } => {
                        let present = panes.contains(pane.as_str());
                        match (present, member.status) {
                            (false, MemberStatus::MissingPane) => false,
                            (false, _) => {
                                member.status = MemberStatus::MissingPane;
                                true
                            }
                            (true, MemberStatus::MissingPane) => {
                                member.status = MemberStatus::Starting;
                                true
                            }
                            (true, _) => false,
                        }
                    }
                    Binding::Session {
                        session_id: Some(sid),
                        tty,
                        pid,
                    } => {
                        let record: Option<SessionRecord> =
                            store.try_load_json(&terminals::session(sid)).unwrap_or(None);
                        match record {
                            Some(record) if record.pid != *pid || record.tty != *tty => {
                                *pid = record.pid.or(*pid);
                                *tty = record.tty.or(tty.take());
                                true
                            }
                            _ => false,
                        }
                    }
                    _ => false,
                };
                if changed {
                    member.updated_at = now;
                    repaired.push(member.member_id.clone());
                }
            }
            Ok(repaired)
        })?;

        if live {
            let session = self.scope.host_session();
            self.scope.update_runtime(|runtime| {
                runtime.state = TeamState::Running;
                runtime.host_session = Some(session);
                Ok(())
            })?;
        }

        self.scope.emit(EventKind::TeamResumed {
            repaired_members: repaired.clone(),
        })?;
        info!("Resumed team {} ({} repaired)", self.scope.id(), repaired.len());
        Ok(ResumeReport {
            host_session_live: live,
            repaired_members: repaired,
        })
    }

    /// Idempotent consistency sweep
    pub fn reconcile(&self) -> FleetResult<ReconcileReport> {
        let keep = self.scope.fleet().config().event_keep;
        let expired_claims = self.scope.tasks().expire_stale_claims()?.len();
        let refreshed_tasks = self.scope.tasks().refresh_blocked()?.len();
        let compacted_events = self.scope.events().compact(keep)?;
        let bridged_workers = self.scope.workers().bridge()?;
        let escalated = self.scope.messages().check_escalation()?.is_some();

        let report = ReconcileReport {
            expired_claims,
            refreshed_tasks,
            compacted_events,
            bridged_workers,
            escalated,
        };
        self.scope.emit(EventKind::TeamReconciled {
            expired_claims,
            compacted_events,
            bridged_workers,
        })?;
        info!("Reconciled team {}: {:?}", self.scope.id(), report);
        Ok(report)
    }

    /// Resume, reconcile, then diagnose; `hard` also runs one auto-heal pass
    pub fn recover(&self, hard: bool) -> FleetResult<RecoverReport> {
        let resume = self.resume()?;
        let reconcile = self.reconcile()?;
        let healed = if hard { self.auto_heal()? } else { Vec::new() };
        let doctor = self.doctor()?;

        self.scope.emit(EventKind::TeamRecovered {
            hard,
            doctor_ok: doctor.is_ok(),
        })?;
        Ok(RecoverReport {
            resume,
            reconcile,
            doctor,
            healed,
        })
    }

    /// Hard-recover the team when doctor fails or recent failures and
    /// restarts exceed their thresholds; otherwise leave it alone
    pub fn auto_recover(&self) -> FleetResult<AutoRecoverReport> {
        let doctor_ok = self.doctor()?.is_ok();
        let since = self.scope.now() - Duration::seconds(RECOVER_WINDOW_SECS);
        let recent = self.scope.events().since_time(since);
        let recent_failures = recent.iter().filter(|e| is_failure(e)).count();
        let recent_restarts = recent.iter().filter(|e| is_restart(e)).count();
        let slo_breached = recent_failures > RECOVER_FAILURES || recent_restarts > RECOVER_RESTARTS;

        let mut report = AutoRecoverReport {
            team_id: self.scope.id().to_string(),
            doctor_ok,
            slo_breached,
            recent_failures,
            recent_restarts,
            action: AutoRecoverAction::None,
            recover: None,
        };
        if doctor_ok && !slo_breached {
            return Ok(report);
        }

        self.scope.emit(EventKind::AutoRecoverTriggered {
            reason: format!(
                "doctor_ok={} slo_breached={} failures={} restarts={}",
                doctor_ok, slo_breached, recent_failures, recent_restarts
            ),
            doctor_ok,
            recent_failures,
            recent_restarts,
        })?;
        match self.recover(true) {
            Ok(recovered) => {
                report.action = AutoRecoverAction::RecoverHard;
                report.recover = Some(recovered);
            }
            Err(e) => {
                warn!("Auto-recover of team {} failed: {}", self.scope.id(), e);
                self.scope.emit(EventKind::AutoRecoverFailed {
                    detail: e.to_string(),
                })?;
                report.action = AutoRecoverAction::RecoverHardFailed;
            }
        }
        info!(
            "Auto-recover of team {}: {:?}",
            self.scope.id(),
            report.action
        );
        Ok(report)
    }

    /// Respawn every live pane member whose pane is missing
    pub fn auto_heal(&self) -> FleetResult<Vec<String>> {
        let (_, panes) = self.live_panes();
        let team = self.scope.load_team()?;
        let lifecycle = self.scope.members();

        let targets: Vec<String> = team
            .members
            .iter()
            .filter(|m| m.kind() == MemberKind::Pane && !m.is_dormant())
            .filter(|m| {
                m.status == MemberStatus::MissingPane
                    || m.pane_id().is_none_or(|pane| !panes.contains(pane))
            })
            .map(|m| m.member_id.clone())
            .collect();

        let mut healed = Vec::new();
        for member_id in targets {
            let tasks = self.scope.tasks().owned_by(&member_id);
            let prompt = format!(
                "{} Report your status to the lead first.",
                lifecycle.resume_prompt(&team, &tasks)
            );
            let options = SpawnOptions {
                prompt: Some(prompt),
                ..Default::default()
            };
            match lifecycle.spawn(&member_id, options) {
                Ok(member) => {
                    let pane_id = member.pane_id().unwrap_or_default().to_string();
                    self.scope.emit(EventKind::TeammateHealed {
                        member_id: member_id.clone(),
                        pane_id,
                    })?;
                    healed.push(member_id);
                }
                Err(e) => warn!("Auto-heal of {} failed: {}", member_id, e),
            }
        }
        if !healed.is_empty() {
            info!("Healed {} members of team {}", healed.len(), self.scope.id());
        }
        Ok(healed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::NewTask;
    use crate::test_support::fixture;

    #[test]
    fn test_resume_flags_missing_panes() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
        fx.host.drop_pane("%1");

        let report = team.recovery().resume().unwrap();
        assert!(report.host_session_live);
        assert_eq!(report.repaired_members, vec!["coder-1"]);
        assert_eq!(
            team.members().get("coder-1").unwrap().status,
            MemberStatus::MissingPane
        );

        let again = team.recovery().resume().unwrap();
        assert!(again.repaired_members.is_empty());
    }

    #[test]
    fn test_hard_recover_respawns_lost_panes() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
        fx.host.drop_pane("%1");

        let report = team.recovery().recover(true).unwrap();
        assert_eq!(report.healed, vec!["coder-1"]);
        assert!(report.doctor.is_ok());

        let member = team.members().get("coder-1").unwrap();
        assert_eq!(member.pane_id(), Some("%2"));
        assert_eq!(member.status, MemberStatus::Starting);
        let (_, keys) = fx.host.keys_sent().pop().unwrap();
        assert!(keys.contains("Report your status to the lead first."));
    }

    #[test]
    fn test_doctor_reports_without_sweeping() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
        team.tasks()
            .add(NewTask {
                title: "Parser".to_string(),
                ..Default::default()
            })
            .unwrap();
        team.tasks().claim("T1", "coder-1", Some(5), false).unwrap();
        fx.clock.advance(Duration::seconds(10));

        let report = team.recovery().doctor().unwrap();
        assert!(!report.is_ok());
        assert!(
            report
                .warnings()
                .any(|f| f.kind == FindingKind::ExpiredClaim)
        );
        assert!(team.tasks().claim_of("T1").is_some());
        assert_eq!(
            team.tasks().get("T1").unwrap().claimed_by.as_deref(),
            Some("coder-1")
        );
    }

    #[test]
    fn test_auto_recover_acts_only_on_unhealthy_team() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();

        let quiet = team.recovery().auto_recover().unwrap();
        assert_eq!(quiet.action, AutoRecoverAction::None);
        assert!(quiet.recover.is_none());

        team.tasks()
            .add(NewTask {
                title: "Parser".to_string(),
                ..Default::default()
            })
            .unwrap();
        team.tasks().claim("T1", "coder-1", Some(5), false).unwrap();
        fx.clock.advance(Duration::seconds(10));

        let report = team.recovery().auto_recover().unwrap();
        assert!(!report.doctor_ok);
        assert_eq!(report.action, AutoRecoverAction::RecoverHard);
        assert_eq!(report.recover.unwrap().reconcile.expired_claims, 1);
        assert!(
            team.events()
                .all()
                .iter()
                .any(|e| e.event_type == "AutoRecoverTriggered")
        );

        let again = team.recovery().auto_recover().unwrap();
        assert!(again.doctor_ok);
        assert_eq!(again.recent_failures, 1);
        assert_eq!(again.action, AutoRecoverAction::None);
    }

    #[test]
    fn test_auto_recover_on_failure_burst() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
        for n in 0..4 {
            team.emit(EventKind::TaskClaimExpired {
                task_id: format!("T{}", n),
                previous_owner: "coder-1".to_string(),
            })
            .unwrap();
        }

        let report = team.recovery().auto_recover().unwrap();
        assert!(report.doctor_ok);
        assert!(report.slo_breached);
        assert_eq!(report.recent_failures, 4);
        assert_eq!(report.action, AutoRecoverAction::RecoverHard);

        fx.clock.advance(Duration::seconds(RECOVER_WINDOW_SECS + 1));
        let later = team.recovery().auto_recover().unwrap();
        assert_eq!(later.recent_failures, 0);
        assert_eq!(later.action, AutoRecoverAction::None);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
        team.tasks()
            .add(NewTask {
                title: "Parser".to_string(),
                ..Default::default()
            })
            .unwrap();
        team.tasks().claim("T1", "coder-1", Some(5), false).unwrap();
        fx.clock.advance(Duration::seconds(6));

        let first = team.recovery().reconcile().unwrap();
        assert_eq!(first.expired_claims, 1);
        let second = team.recovery().reconcile().unwrap();
        assert_eq!(second.expired_claims, 0);
        assert_eq!(second.refreshed_tasks, 0);
    }
}
