//! Human-facing collaboration records: ownership, presence and handoffs

mod handoff;

pub use handoff::{Handoff, HandoffMember, HandoffTask, HandoffView};

use crate::error::{FleetError, FleetResult};
use crate::events::EventKind;
use crate::team::{Member, MemberStatus, Ownership, Presence, Role, TeamScope};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// One row of the `who` table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoRow {
    pub member_id: String,
    pub role: Role,
    pub presence: Option<Presence>,
    pub status: MemberStatus,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoReport {
    pub team_id: String,
    pub ownership: Option<Ownership>,
    pub members: Vec<WhoRow>,
}

/// Latest sign of life from a member
fn last_activity(member: &Member) -> Option<DateTime<Utc>> {
    [
        member.last_seen,
        member.presence_updated_at,
        member.last_spawned_at,
    ]
    .into_iter()
    .flatten()
    .max()
}

/// Collaboration records of one team
pub struct Collaboration<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> Collaboration<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    pub fn ownership(&self) -> FleetResult<Option<Ownership>> {
        Ok(self.scope.load_team()?.ownership)
    }

    /// Replace the owner and escalation lists; `project` is kept when `None`
    pub fn set_ownership(
        &self,
        owners: Vec<String>,
        escalation: Vec<String>,
        project: Option<String>,
    ) -> FleetResult<Ownership> {
        if owners.iter().chain(&escalation).any(|name| name.trim().is_empty()) {
            return Err(FleetError::validation_field(
                "Owner names must not be empty",
                "owners",
            ));
        }
        let now = self.scope.now();
        let ownership = self.scope.update_team(|team| {
            let previous = team.ownership.take().unwrap_or_default();
            let ownership = Ownership {
                owners,
                escalation,
                project: project.or(previous.project),
                updated_at: Some(now),
            };
            team.ownership = Some(ownership.clone());
            Ok(ownership)
        })?;

        self.scope.emit(EventKind::OwnershipUpdated {
            owners: ownership.owners.clone(),
            escalation: ownership.escalation.clone(),
            project: ownership.project.clone(),
        })?;
        info!(
            "Ownership of team {} set to {:?}",
            self.scope.id(),
            ownership.owners
        );
        Ok(ownership)
    }

    /// Record a member's declared availability; unchanged presence emits nothing
    pub fn set_presence(&self, member_id: &str, presence: Presence) -> FleetResult<Member> {
        let now = self.scope.now();
        let (member, previous) = self.scope.update_team(|team| {
            let member = team
                .member_mut(member_id)
                .ok_or_else(|| FleetError::not_found("Member", member_id))?;
            let previous = member.presence;
            if previous != Some(presence) {
                member.presence = Some(presence);
                member.presence_updated_at = Some(now);
                member.updated_at = now;
            }
            Ok((member.clone(), previous))
        })?;

        if previous != Some(presence) {
            self.scope.emit(EventKind::OperatorPresenceChanged {
                member_id: member_id.to_string(),
                from: previous,
                to: presence,
            })?;
        }
        Ok(member)
    }

    /// Members with role, presence and status, lead first
    pub fn who(&self) -> FleetResult<WhoReport> {
        let team = self.scope.load_team()?;
        let mut members: Vec<WhoRow> = team
            .members
            .iter()
            .map(|m| WhoRow {
                member_id: m.member_id.clone(),
                role: m.role,
                presence: m.presence,
                status: m.status,
                last_activity: last_activity(m),
            })
            .collect();
        members.sort_by_key(|row| row.role != Role::Lead);
        Ok(WhoReport {
            team_id: team.team_id,
            ownership: team.ownership,
            members,
        })
    }
}

impl TeamScope<'_> {
    pub fn collab(&self) -> Collaboration<'_> {
        Collaboration::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SpawnOptions;
    use crate::test_support::fixture;
    use chrono::Duration;

    #[test]
    fn test_ownership_keeps_project_when_omitted() {
        let fx = fixture();
        let team = fx.alpha();
        assert!(team.collab().ownership().unwrap().is_none());

        team.collab()
            .set_ownership(
                vec!["dana".to_string()],
                vec!["ops-oncall".to_string()],
                Some("parser-rewrite".to_string()),
            )
            .unwrap();
        fx.clock.advance(Duration::minutes(5));
        let updated = team
            .collab()
            .set_ownership(vec!["dana".to_string(), "lee".to_string()], vec![], None)
            .unwrap();

        assert_eq!(updated.project.as_deref(), Some("parser-rewrite"));
        assert!(updated.escalation.is_empty());
        assert_eq!(team.collab().ownership().unwrap(), Some(updated));

        let events = team.events().all();
        let last = events.last().unwrap();
        assert_eq!(last.event_type, "OwnershipUpdated");
        assert_eq!(last.payload["owners"], serde_json::json!(["dana", "lee"]));
    }

    #[test]
    fn test_blank_owner_rejected() {
        let fx = fixture();
        let team = fx.alpha();
        let err = team
            .collab()
            .set_ownership(vec![" ".to_string()], vec![], None)
            .unwrap_err();
        assert!(err.to_string().contains("Owner names"));
    }

    #[test]
    fn test_presence_change_emits_transition_once() {
        let fx = fixture();
        let team = fx.alpha();

        let member = team.collab().set_presence("lead", Presence::Busy).unwrap();
        assert_eq!(member.presence, Some(Presence::Busy));
        team.collab().set_presence("lead", Presence::Busy).unwrap();
        team.collab().set_presence("lead", Presence::Away).unwrap();

        let changes: Vec<_> = team
            .events()
            .all()
            .into_iter()
            .filter(|e| e.event_type == "OperatorPresenceChanged")
            .collect();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].payload["from"].is_null());
        assert_eq!(changes[1].str_field("from"), Some("busy"));
        assert_eq!(changes[1].str_field("to"), Some("away"));

        let err = team
            .collab()
            .set_presence("ghost", Presence::Offline)
            .unwrap_err();
        assert_eq!(err.error_code(), "FLEET_NOT_FOUND");
    }

    #[test]
    fn test_who_lists_lead_first_with_activity() {
        let fx = fixture();
        let team = fx.alpha();
        team.members().spawn("coder-1", SpawnOptions::default()).unwrap();
        fx.clock.advance(Duration::minutes(1));
        team.collab().set_presence("coder-1", Presence::Available).unwrap();

        let who = team.collab().who().unwrap();
        assert_eq!(who.members[0].member_id, "lead");
        let coder = who
            .members
            .iter()
            .find(|row| row.member_id == "coder-1")
            .unwrap();
        assert_eq!(coder.presence, Some(Presence::Available));
        assert_eq!(coder.last_activity, Some(fx.fleet.now()));
    }
}
