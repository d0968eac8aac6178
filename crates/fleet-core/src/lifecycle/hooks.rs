//! Agent runtime hooks: session start/end, heartbeat and pushed events

use super::members::{AttachOutcome, Lifecycle};
use crate::error::{FleetError, FleetResult};
use crate::events::{Event, EventFilter, EventKind, SESSION_EVENT_TYPES};
use crate::ids::validate_id;
use crate::tasks::ExpiredClaim;
use crate::team::{Binding, Member, MemberStatus};
use chrono::Duration;
use serde::Serialize;
use tracing::debug;

/// What one heartbeat did
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatReport {
    /// Tasks whose leases were renewed
    pub renewed: Vec<String>,
    pub expired: Vec<ExpiredClaim>,
    /// Members newly reported idle
    pub idle: Vec<String>,
}

impl Lifecycle<'_> {
    /// `session-start`: bind the session and flush the mailbox
    pub fn session_start(
        &self,
        member_id: &str,
        session_id: &str,
        pid: Option<u32>,
        tty: Option<String>,
    ) -> FleetResult<AttachOutcome> {
        self.attach(member_id, session_id, pid, tty)
    }

    /// Sweep expired leases, then record liveness and renew the leases of the
    /// reporting member, and report members that went quiet.
    ///
    /// Without a member nothing is renewed: only a member that reports in
    /// keeps its claims alive.
    pub fn heartbeat(&self, member_id: Option<&str>) -> FleetResult<HeartbeatReport> {
        let scope = self.scope();
        let mut report = HeartbeatReport {
            expired: scope.tasks().expire_stale_claims()?,
            ..Default::default()
        };

        if let Some(member_id) = member_id {
            self.touch(member_id)?;
            report.renewed = scope.tasks().renew_member_claims(member_id)?;
        }

        report.idle = self.scan_idle()?;
        Ok(report)
    }

    /// Update `last_seen`; a starting or idle member counts as active once it
    /// reports in
    pub fn touch(&self, member_id: &str) -> FleetResult<Member> {
        let now = self.scope().now();
        self.scope().update_team(|team| {
            let member = team
                .member_mut(member_id)
                .ok_or_else(|| FleetError::not_found("Member", member_id))?;
            member.last_seen = Some(now);
            if matches!(member.status, MemberStatus::Starting | MemberStatus::Idle) {
                member.status = MemberStatus::Active;
            }
            member.updated_at = now;
            Ok(member.clone())
        })
    }

    /// Emit `TeammateIdle` for teammates silent past the threshold, at most
    /// once per cooldown per member, and demote live ones to `idle`
    fn scan_idle(&self) -> FleetResult<Vec<String>> {
        let scope = self.scope();
        let config = scope.fleet().config();
        let now = scope.now();
        let threshold = Duration::seconds(config.idle_threshold_secs as i64);
        let cooldown = Duration::seconds(config.idle_cooldown_secs as i64);

        let team = scope.load_team()?;
        let silent: Vec<(String, i64)> = team
            .teammates()
            .filter(|m| match m.status {
                MemberStatus::Active | MemberStatus::Starting => true,
                MemberStatus::Idle => m.last_seen.is_some(),
                _ => false,
            })
            .filter_map(|m| {
                let quiet = now - m.last_seen.unwrap_or(m.joined_at);
                (quiet >= threshold).then(|| (m.member_id.clone(), quiet.num_seconds()))
            })
            .collect();
        if silent.is_empty() {
            return Ok(Vec::new());
        }

        let due: Vec<(String, i64)> = scope.update_runtime(|runtime| {
            let due: Vec<(String, i64)> = silent
                .into_iter()
                .filter(|(id, _)| {
                    runtime
                        .last_idle_at
                        .get(id)
                        .is_none_or(|last| now - *last >= cooldown)
                })
                .collect();
            for (id, _) in &due {
                runtime.last_idle_at.insert(id.clone(), now);
            }
            Ok(due)
        })?;

        if due.is_empty() {
            return Ok(Vec::new());
        }

        scope.update_team(|team| {
            for (id, _) in &due {
                if let Some(member) = team.member_mut(id) {
                    if matches!(member.status, MemberStatus::Active | MemberStatus::Starting) {
                        member.status = MemberStatus::Idle;
                        member.updated_at = now;
                    }
                }
            }
            Ok(())
        })?;
        for (member_id, idle_seconds) in &due {
            scope.emit(EventKind::TeammateIdle {
                member_id: member_id.clone(),
                idle_seconds: *idle_seconds,
            })?;
        }
        debug!("Idle scan reported {} members", due.len());
        Ok(due.into_iter().map(|(id, _)| id).collect())
    }

    /// `session-end`: mark the member closed and drop its session binding so
    /// later messages queue in the mailbox
    pub fn session_end(&self, member_id: &str) -> FleetResult<Member> {
        let now = self.scope().now();
        let member = self.scope().update_team(|team| {
            let member = team
                .member_mut(member_id)
                .ok_or_else(|| FleetError::not_found("Member", member_id))?;
            match &mut member.binding {
                Binding::Session { session_id, .. } | Binding::Pane { session_id, .. } => {
                    *session_id = None;
                }
                Binding::Worker => {}
            }
            member.status = MemberStatus::Closed;
            member.updated_at = now;
            Ok(member.clone())
        })?;
        self.scope().emit(EventKind::TeammateClosed {
            member_id: member_id.to_string(),
        })?;
        Ok(member)
    }

    /// New events relevant to an agent session, tracked by its own cursor
    pub fn session_events(&self, session_id: &str) -> FleetResult<Vec<Event>> {
        validate_id("session id", session_id)?;
        let filter = EventFilter::for_consumer(format!("session-{}", session_id))
            .with_types(SESSION_EVENT_TYPES);
        self.scope().events().check(&filter)
    }
}
