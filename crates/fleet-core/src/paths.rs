//! Document keys inside the store

/// Index of all teams
pub const TEAM_INDEX: &str = "teams/index.json";
/// Parent of every team namespace
pub const TEAMS_DIR: &str = "teams";
/// Parent of archived namespaces
pub const ARCHIVE_DIR: &str = "archive";
/// Budget limits read by the file cost source
pub const BUDGETS: &str = "budgets.json";
/// Spend totals read by the file cost source
pub const SPEND: &str = "spend.json";

/// Keys of one team's namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPaths {
    root: String,
}

impl TeamPaths {
    pub fn new(team_id: &str) -> Self {
        Self {
            root: format!("{}/{}", TEAMS_DIR, team_id),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn join(&self, rest: &str) -> String {
        format!("{}/{}", self.root, rest)
    }

    pub fn config(&self) -> String {
        self.join("config.json")
    }

    pub fn runtime(&self) -> String {
        self.join("runtime.json")
    }

    pub fn tasks(&self) -> String {
        self.join("tasks.json")
    }

    pub fn events(&self) -> String {
        self.join("events.jsonl")
    }

    pub fn messages(&self) -> String {
        self.join("messages.jsonl")
    }

    pub fn workers(&self) -> String {
        self.join("workers.json")
    }

    pub fn summary(&self) -> String {
        self.join("summary.json")
    }

    pub fn mailboxes_dir(&self) -> String {
        self.join("mailboxes")
    }

    pub fn mailbox(&self, member_id: &str) -> String {
        self.join(&format!("mailboxes/{}.jsonl", member_id))
    }

    pub fn claims_dir(&self) -> String {
        self.join("claims")
    }

    pub fn claim(&self, task_id: &str) -> String {
        self.join(&format!("claims/{}.json", task_id))
    }

    pub fn cursors_dir(&self) -> String {
        self.join("cursors")
    }

    pub fn cursor(&self, consumer: &str) -> String {
        self.join(&format!("cursors/{}.txt", consumer))
    }

    pub fn handoffs_dir(&self) -> String {
        self.join("handoffs")
    }

    pub fn handoff(&self, handoff_id: &str) -> String {
        self.join(&format!("handoffs/{}.json", handoff_id))
    }

    /// Lock guarding the tasks document and every claim file
    pub fn tasks_lock(&self) -> String {
        self.join(".tasks.lock")
    }

    /// Lock guarding the runtime document and event sequence
    pub fn runtime_lock(&self) -> String {
        self.join(".runtime.lock")
    }
}

/// Terminal registry shared by all teams
pub mod terminals {
    pub fn session(session_id: &str) -> String {
        format!("terminals/session-{}.json", session_id)
    }

    pub fn inbox(session_id: &str) -> String {
        format!("terminals/inbox/{}.jsonl", session_id)
    }

    pub fn result(worker_task_id: &str) -> String {
        format!("terminals/results/{}.json", worker_task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_keys() {
        let paths = TeamPaths::new("alpha");
        assert_eq!(paths.tasks(), "teams/alpha/tasks.json");
        assert_eq!(paths.claim("T1"), "teams/alpha/claims/T1.json");
        assert_eq!(paths.cursor("lead"), "teams/alpha/cursors/lead.txt");
        assert_eq!(paths.handoff("handoff-1"), "teams/alpha/handoffs/handoff-1.json");
        assert_eq!(paths.tasks_lock(), "teams/alpha/.tasks.lock");
        assert_ne!(paths.tasks_lock(), paths.runtime_lock());
        assert_eq!(terminals::inbox("s1"), "terminals/inbox/s1.jsonl");
    }
}
