//! Team, member and runtime documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Team configuration stored in `teams/<id>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Filesystem-safe slug, immutable
    pub team_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub lead_member_id: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Humans accountable for a team
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ownership {
    #[serde(default)]
    pub owners: Vec<String>,
    /// Contacted, in order, when the owners are unavailable
    #[serde(default)]
    pub escalation: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Team {
    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.member_id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.member_id == member_id)
    }

    pub fn lead(&self) -> Option<&Member> {
        self.member(&self.lead_member_id)
    }

    pub fn is_lead(&self, member_id: &str) -> bool {
        self.lead_member_id == member_id
    }

    /// Members other than the lead
    pub fn teammates(&self) -> impl Iterator<Item = &Member> {
        self.members
            .iter()
            .filter(move |m| m.member_id != self.lead_member_id)
    }
}

/// Member role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Lead,
    Teammate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lead => write!(f, "lead"),
            Self::Teammate => write!(f, "teammate"),
        }
    }
}

/// Member status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Idle,
    Starting,
    Active,
    Paused,
    RestartRequested,
    Replaced,
    Stopped,
    #[serde(rename = "missing-pane")]
    MissingPane,
    Closed,
}

impl MemberStatus {
    /// Statuses that fleet-wide operations leave alone
    pub fn is_dormant(&self) -> bool {
        matches!(self, Self::Paused | Self::Stopped | Self::Replaced)
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::RestartRequested => "restart_requested",
            Self::Replaced => "replaced",
            Self::Stopped => "stopped",
            Self::MissingPane => "missing-pane",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Availability an operator declares for a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Available,
    Busy,
    Away,
    Offline,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Busy => write!(f, "busy"),
            Self::Away => write!(f, "away"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for Presence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "busy" => Ok(Self::Busy),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            other => Err(format!(
                "unknown presence: {} (expected available, busy, away or offline)",
                other
            )),
        }
    }
}

/// Kind tag of a member's execution binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Session,
    Pane,
    Worker,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Pane => write!(f, "pane"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

impl FromStr for MemberKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(Self::Session),
            "pane" => Ok(Self::Pane),
            "worker" => Ok(Self::Worker),
            other => Err(format!("unknown member kind: {}", other)),
        }
    }
}

/// How a pane was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnMode {
    SplitPane,
    NewWindow,
}

/// Execution binding, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum Binding {
    /// Interactive agent session
    Session {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tty: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
    },
    /// Hosted multiplexer pane, optionally with the session running inside it
    Pane {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pane_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pane_tty: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host_session: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spawn_mode: Option<SpawnMode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// Asynchronous background job; no live binding
    Worker,
}

impl Binding {
    /// Empty binding of the given kind
    pub fn unbound(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Session => Self::Session {
                session_id: None,
                tty: None,
                pid: None,
            },
            MemberKind::Pane => Self::Pane {
                pane_id: None,
                pane_tty: None,
                host_session: None,
                spawn_mode: None,
                session_id: None,
            },
            MemberKind::Worker => Self::Worker,
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            Self::Session { .. } => MemberKind::Session,
            Self::Pane { .. } => MemberKind::Pane,
            Self::Worker => MemberKind::Worker,
        }
    }
}

/// A team member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub member_id: String,
    pub name: String,
    pub role: Role,
    /// Specialty such as coder or reviewer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: MemberStatus,
    #[serde(flatten)]
    pub binding: Binding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_spawned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_updated_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(member_id: &str, role: Role, kind: MemberKind, now: DateTime<Utc>) -> Self {
        Self {
            member_id: member_id.to_string(),
            name: member_id.to_string(),
            role,
            agent_type: None,
            model: None,
            status: MemberStatus::Idle,
            binding: Binding::unbound(kind),
            cwd: None,
            joined_at: now,
            updated_at: now,
            last_seen: None,
            last_spawned_at: None,
            replaced_by: None,
            presence: None,
            presence_updated_at: None,
        }
    }

    pub fn kind(&self) -> MemberKind {
        self.binding.kind()
    }

    /// Agent session this member is attached to, if any
    pub fn session_id(&self) -> Option<&str> {
        match &self.binding {
            Binding::Session { session_id, .. } | Binding::Pane { session_id, .. } => {
                session_id.as_deref()
            }
            Binding::Worker => None,
        }
    }

    pub fn pane_id(&self) -> Option<&str> {
        match &self.binding {
            Binding::Pane { pane_id, .. } => pane_id.as_deref(),
            _ => None,
        }
    }

    pub fn host_pid(&self) -> Option<u32> {
        match &self.binding {
            Binding::Session { pid, .. } => *pid,
            _ => None,
        }
    }

    pub fn is_dormant(&self) -> bool {
        self.status.is_dormant()
    }

    /// Whether there is any live binding to talk to
    pub fn has_binding(&self) -> bool {
        self.pane_id().is_some() || self.session_id().is_some()
    }
}

/// Team lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamState {
    Running,
    #[default]
    Stopped,
    TornDown,
}

impl fmt::Display for TeamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::TornDown => write!(f, "torn_down"),
        }
    }
}

/// Runtime document: lifecycle state and the event sequence counter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeState {
    pub state: TeamState,
    pub event_seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last `TeammateIdle` emission per member
    pub last_idle_at: BTreeMap<String, DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_escalation_at: Option<DateTime<Utc>>,
}

/// Entry of `teams/index.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub team_id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamIndex {
    #[serde(default)]
    pub teams: Vec<IndexEntry>,
}

impl TeamIndex {
    pub fn upsert(&mut self, entry: IndexEntry) {
        match self.teams.iter_mut().find(|e| e.team_id == entry.team_id) {
            Some(existing) => *existing = entry,
            None => self.teams.push(entry),
        }
        self.teams.sort_by(|a, b| a.team_id.cmp(&b.team_id));
    }

    pub fn remove(&mut self, team_id: &str) {
        self.teams.retain(|e| e.team_id != team_id);
    }
}

/// Session facts published by the agent runtime in `terminals/session-<sid>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub tty: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_binding_is_flattened_and_tagged() {
        let now = Utc::now();
        let mut member = Member::new("coder-1", Role::Teammate, MemberKind::Pane, now);
        member.binding = Binding::Pane {
            pane_id: Some("%3".to_string()),
            pane_tty: Some("/dev/pts/3".to_string()),
            host_session: Some("fleet-alpha".to_string()),
            spawn_mode: Some(SpawnMode::SplitPane),
            session_id: None,
        };

        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value["kind"], "pane");
        assert_eq!(value["paneId"], "%3");
        assert_eq!(value["spawnMode"], "split-pane");
        assert_eq!(value["memberId"], "coder-1");

        let back: Member = serde_json::from_value(value).unwrap();
        assert_eq!(back.pane_id(), Some("%3"));
        assert_eq!(back.kind(), MemberKind::Pane);
    }

    #[test]
    fn test_member_status_names() {
        assert_eq!(
            serde_json::to_value(MemberStatus::MissingPane).unwrap(),
            json!("missing-pane")
        );
        assert_eq!(
            serde_json::to_value(MemberStatus::RestartRequested).unwrap(),
            json!("restart_requested")
        );
        assert!(MemberStatus::Replaced.is_dormant());
        assert!(!MemberStatus::MissingPane.is_dormant());
    }

    #[test]
    fn test_session_binding_accessors() {
        let value = json!({
            "memberId": "lead",
            "name": "lead",
            "role": "lead",
            "status": "active",
            "kind": "session",
            "sessionId": "abc",
            "pid": 4242,
            "joinedAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let member: Member = serde_json::from_value(value).unwrap();
        assert_eq!(member.session_id(), Some("abc"));
        assert_eq!(member.host_pid(), Some(4242));
        assert_eq!(member.pane_id(), None);
        assert!(member.has_binding());
    }

    #[test]
    fn test_index_upsert() {
        let now = Utc::now();
        let mut index = TeamIndex::default();
        for id in ["beta", "alpha", "beta"] {
            index.upsert(IndexEntry {
                team_id: id.to_string(),
                name: id.to_uppercase(),
                updated_at: now,
            });
        }
        let ids: Vec<_> = index.teams.iter().map(|e| e.team_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta"]);
        index.remove("alpha");
        assert_eq!(index.teams.len(), 1);
    }
}
