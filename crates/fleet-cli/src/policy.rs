//! Policy gate consulted before commands run
//!
//! The engine itself never enforces policy; it only records the events an
//! audit layer reads. The CLI asks a [`PolicyService`] first and refuses
//! the command on denial.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

/// Acting role of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Lead,
    Operator,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lead => write!(f, "lead"),
            Self::Operator => write!(f, "operator"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

/// Named actions checked by the gate
pub mod actions {
    pub const TEARDOWN: &str = "teardown";
    pub const ARCHIVE: &str = "archive";
    pub const GC: &str = "gc";
    pub const STATUS: &str = "status";
    pub const DASHBOARD: &str = "dashboard";
    pub const DOCTOR: &str = "doctor";
    pub const EVENT_CHECK: &str = "event.check";
    pub const FORCE_CLAIM: &str = "task.force-claim";
    pub const INTERRUPT: &str = "member.interrupt";
    pub const AUTO_RECOVER: &str = "team.auto-recover";
    pub const RECOMMEND: &str = "team.recommend-preset";
    pub const WHO: &str = "collab.who";
    pub const HANDOFF_CREATE: &str = "collab.handoff-create";
    pub const HANDOFF_LATEST: &str = "collab.handoff-latest";
    pub const OWNERSHIP_GET: &str = "collab.ownership-get";
    pub const OWNERSHIP_SET: &str = "collab.ownership-set";
    pub const PRESENCE: &str = "collab.presence";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
}

impl Decision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Answers "may `role` perform `action` on `team`"
pub trait PolicyService: Send + Sync {
    fn check(&self, team: &str, role: Role, action: &str) -> Decision;
}

/// Static matrix: lead may do anything, operators anything but destructive
/// team operations and ownership changes, viewers only read.
#[derive(Debug, Default)]
pub struct RoleMatrixPolicy;

const OPERATOR_DENIED: &[&str] = &[
    actions::TEARDOWN,
    actions::ARCHIVE,
    actions::GC,
    actions::OWNERSHIP_SET,
];

const VIEWER_ALLOWED: &[&str] = &[
    actions::STATUS,
    actions::DASHBOARD,
    actions::DOCTOR,
    actions::EVENT_CHECK,
    actions::RECOMMEND,
    actions::WHO,
    actions::HANDOFF_LATEST,
    actions::OWNERSHIP_GET,
];

impl PolicyService for RoleMatrixPolicy {
    fn check(&self, team: &str, role: Role, action: &str) -> Decision {
        match role {
            Role::Lead => Decision::allow("lead may perform every action"),
            Role::Operator if OPERATOR_DENIED.contains(&action) => Decision::deny(format!(
                "role operator may not run {} on team {}",
                action, team
            )),
            Role::Operator => Decision::allow(format!("operator may run {}", action)),
            Role::Viewer if VIEWER_ALLOWED.contains(&action) => {
                Decision::allow(format!("viewer may run {}", action))
            }
            Role::Viewer => Decision::deny(format!(
                "role viewer may not run {} on team {}",
                action, team
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_is_allowed_everything() {
        let policy = RoleMatrixPolicy;
        for action in [actions::TEARDOWN, actions::GC, actions::FORCE_CLAIM, "task.add"] {
            assert!(policy.check("alpha", Role::Lead, action).allowed);
        }
    }

    #[test]
    fn test_operator_cannot_destroy_teams() {
        let policy = RoleMatrixPolicy;
        let decision = policy.check("alpha", Role::Operator, actions::ARCHIVE);
        assert!(!decision.allowed);
        assert!(decision.reason.contains("operator"));
        assert!(policy.check("alpha", Role::Operator, actions::INTERRUPT).allowed);
        assert!(policy.check("alpha", Role::Operator, actions::FORCE_CLAIM).allowed);
    }

    #[test]
    fn test_only_lead_assigns_ownership() {
        let policy = RoleMatrixPolicy;
        assert!(policy.check("alpha", Role::Lead, actions::OWNERSHIP_SET).allowed);
        assert!(!policy.check("alpha", Role::Operator, actions::OWNERSHIP_SET).allowed);
        assert!(!policy.check("alpha", Role::Viewer, actions::OWNERSHIP_SET).allowed);
        assert!(policy.check("alpha", Role::Operator, actions::PRESENCE).allowed);
        assert!(policy.check("alpha", Role::Viewer, actions::OWNERSHIP_GET).allowed);
        assert!(policy.check("alpha", Role::Viewer, actions::WHO).allowed);
        assert!(!policy.check("alpha", Role::Viewer, actions::HANDOFF_CREATE).allowed);
    }

    #[test]
    fn test_viewer_is_read_only() {
        let policy = RoleMatrixPolicy;
        assert!(policy.check("alpha", Role::Viewer, actions::DASHBOARD).allowed);
        assert!(policy.check("alpha", Role::Viewer, actions::EVENT_CHECK).allowed);
        assert!(!policy.check("alpha", Role::Viewer, actions::INTERRUPT).allowed);
        assert!(!policy.check("alpha", Role::Viewer, "task.claim").allowed);
    }
}
