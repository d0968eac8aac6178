//! CLI argument definitions

use crate::policy::Role;
use clap::{Parser, Subcommand};
use fleet_core::scaling::BootstrapChoice;
use fleet_core::team::Presence;
use fleet_core::{MemberKind, Preset, Priority, TaskStatus, Template};
use std::path::PathBuf;

/// Fleet - file-based coordination for teams of coding agents
#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Coordinate a team of autonomous coding agents")]
#[command(version)]
#[command(
    long_about = "Coordinate a team of autonomous coding agents through shared state files.

Examples:
  fleet team create \"Compiler Crew\"          Create a team (id: compiler-crew)
  fleet --team compiler-crew team start      Start its multiplexer session
  fleet --team compiler-crew task add Lexer  Add a task
  fleet --team compiler-crew team dashboard  Inspect the team"
)]
pub struct Cli {
    /// Path to a configuration file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Team to operate on
    #[arg(long, short = 't', global = true, env = "FLEET_TEAM")]
    pub team: Option<String>,

    /// Acting role checked by the policy gate
    #[arg(long = "as-role", global = true, env = "FLEET_ROLE", value_enum, default_value_t = Role::Lead)]
    pub as_role: Role,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Team lifecycle, recovery and scaling
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Member lifecycle
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Task ledger and leases
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Peer messaging
    Message {
        #[command(subcommand)]
        action: MessageAction,
    },

    /// Event log queries
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Asynchronous worker bindings
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },

    /// Agent session hooks
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },

    /// Handoffs, ownership and operator presence
    Collab {
        #[command(subcommand)]
        action: CollabAction,
    },
}

#[derive(Subcommand)]
pub enum TeamAction {
    /// List known teams
    List,

    /// Create a team
    Create {
        /// Display name; the id defaults to its slug
        name: String,

        /// Explicit team id
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Member id of the lead
        #[arg(long, default_value = "lead")]
        lead: String,

        /// Session the lead is already running in
        #[arg(long)]
        lead_session: Option<String>,

        /// Working directory for spawned members
        #[arg(long)]
        cwd: Option<String>,

        /// Replace an existing team with the same id
        #[arg(long)]
        force: bool,
    },

    /// Ensure the multiplexer session exists and mark the team running
    Start,

    /// Stop the team
    Stop {
        /// Leave the multiplexer session alive
        #[arg(long)]
        keep_session: bool,
    },

    /// Task counts, members and runtime state
    Status,

    /// Status plus messages, budget and recent events
    Dashboard,

    /// Repair member bindings from host facts
    Resume,

    /// Idempotent consistency sweep
    Reconcile,

    /// Read-only diagnostics
    Doctor,

    /// Resume, reconcile and diagnose
    Recover {
        /// Also respawn lost panes once
        #[arg(long)]
        hard: bool,
    },

    /// Same as `recover --hard`
    RecoverHard,

    /// Hard-recover when doctor fails or recent failures pile up
    AutoRecover {
        /// Check every known team
        #[arg(long)]
        all: bool,
    },

    /// Suggest a preset from budget, kind of work and repository size
    RecommendPreset {
        /// Daily budget in USD; the team's budget pressure is used otherwise
        #[arg(long)]
        budget: Option<f64>,

        /// build, feature, research, docs, review, ...
        #[arg(long, default_value = "build")]
        task_type: String,

        /// Repository whose files are counted
        #[arg(long)]
        repo: Option<PathBuf>,
    },

    /// Respawn pane members whose pane is gone
    AutoHeal {
        /// Repeat every N seconds until interrupted
        #[arg(long = "loop", value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Apply a starting preset (auto picks from budget pressure)
    Bootstrap {
        /// lite, standard, heavy or auto
        #[arg(long, default_value = "auto")]
        preset: BootstrapChoice,

        /// Spawn new members in panes
        #[arg(long)]
        spawn: bool,
    },

    /// Evaluate the scaling policy
    Autoscale {
        /// Apply a scale-up or scale-down
        #[arg(long)]
        apply: bool,

        /// Decide only; record nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Move membership to a preset
    ScaleToPreset {
        preset: Preset,

        /// Stop extra members instead of pausing them
        #[arg(long)]
        hard: bool,

        /// Spawn new members in panes
        #[arg(long)]
        spawn: bool,
    },

    /// Pause every teammate
    Pause,

    /// Resume every paused teammate
    ResumeAll,

    /// Write a summary, stop members and the team
    Teardown {
        /// Note stored in summary.json
        #[arg(long)]
        note: Option<String>,

        #[arg(long)]
        keep_session: bool,
    },

    /// Move the team namespace into the archive
    Archive,

    /// Remove old archives, stale cursors and dead claims
    Gc {
        /// Age threshold in days
        #[arg(long, default_value_t = 7)]
        max_age_days: i64,
    },
}

#[derive(Subcommand)]
pub enum MemberAction {
    /// List members
    List,

    /// Register a member without a binding
    Add {
        member: String,

        #[arg(long, default_value = "session")]
        kind: MemberKind,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        agent_type: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        cwd: Option<String>,
    },

    /// Bind a running agent session to a member
    Attach {
        member: String,
        session_id: String,

        #[arg(long)]
        pid: Option<u32>,

        #[arg(long)]
        tty: Option<String>,
    },

    /// Launch a member in a new pane
    Spawn {
        member: String,

        /// Initial prompt
        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        cwd: Option<String>,

        #[arg(long)]
        agent_type: Option<String>,

        #[arg(long)]
        model: Option<String>,
    },

    /// Select a member's pane
    Focus { member: String },

    /// Interrupt a member
    Interrupt {
        member: String,

        /// Notice delivered through the inbox when there is no pane or process
        #[arg(long)]
        message: Option<String>,
    },

    /// Restart a member and hand it its open tasks
    Restart { member: String },

    /// Replace a member with a new id
    Replace {
        old: String,
        new: String,

        /// Stop the old member
        #[arg(long)]
        stop_old: bool,

        /// Spawn the new member
        #[arg(long)]
        spawn: bool,
    },

    /// Copy a member's settings into a new idle member
    Clone { source: String, new: String },

    /// Pause a member
    Pause { member: String },

    /// Resume a paused member
    Resume { member: String },

    /// Stop a member
    Stop {
        member: String,

        /// Kill the member's pane
        #[arg(long)]
        kill_pane: bool,
    },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        title: String,

        /// Explicit id (T<n> when omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long, default_value = "")]
        description: String,

        /// Comma-separated task ids
        #[arg(long, value_delimiter = ',')]
        depends_on: Vec<String>,

        /// Comma-separated file paths
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,

        #[arg(long, default_value = "normal")]
        priority: Priority,

        #[arg(long)]
        created_by: Option<String>,
    },

    /// List tasks
    List {
        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        owner: Option<String>,
    },

    /// Show one task with its lease
    Show { task: String },

    /// Claim a task for a member
    Claim {
        task: String,
        member: String,

        /// Lease length in seconds
        #[arg(long)]
        ttl: Option<u64>,

        /// Override ownership, dependency and file conflicts
        #[arg(long)]
        force: bool,
    },

    /// Move a task to a new status
    Update {
        task: String,
        status: TaskStatus,

        /// Acting member
        #[arg(long)]
        member: Option<String>,

        #[arg(long)]
        note: Option<String>,

        #[arg(long)]
        force: bool,
    },

    /// Release a member's claim
    ReleaseClaim {
        task: String,
        member: String,

        #[arg(long)]
        force: bool,
    },

    /// Split a goal into dependency-chained tasks
    Decompose {
        goal: String,

        /// feature, bugfix or refactor
        #[arg(long, default_value = "feature")]
        template: Template,

        /// Task id prefix
        #[arg(long)]
        prefix: String,

        #[arg(long)]
        created_by: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MessageAction {
    /// Send a message to one member
    Send {
        from: String,
        to: String,
        content: String,

        #[arg(long, default_value = "normal")]
        priority: Priority,

        /// Idempotency key
        #[arg(long)]
        id: Option<String>,

        /// Expiry in seconds
        #[arg(long)]
        ttl: Option<u64>,

        #[arg(long)]
        reply_to: Option<String>,
    },

    /// Send to every teammate
    Broadcast {
        from: String,
        content: String,

        #[arg(long, default_value = "normal")]
        priority: Priority,

        /// Comma-separated member ids to skip
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Base idempotency key
        #[arg(long)]
        id: Option<String>,
    },

    /// Broadcast that also reaches the lead
    Announce {
        from: String,
        content: String,

        #[arg(long, default_value = "normal")]
        priority: Priority,
    },

    /// Read a member's queued messages
    Inbox {
        member: String,

        /// Empty the queue after reading
        #[arg(long)]
        clear: bool,
    },

    /// Acknowledge a message
    Ack { message_id: String, member: String },
}

#[derive(Subcommand)]
pub enum EventAction {
    /// Read new events, optionally through a named cursor
    Check {
        /// Consumer whose cursor is read and advanced
        #[arg(long)]
        consumer: Option<String>,

        #[arg(long)]
        since_id: Option<u64>,

        /// Comma-separated event types
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Last N events
    Tail {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
}

#[derive(Subcommand)]
pub enum WorkerAction {
    /// List worker bindings
    List,

    /// Register an external job
    Register {
        worker_task_id: String,

        #[arg(long)]
        task: Option<String>,

        #[arg(long)]
        member: Option<String>,

        /// Complete the linked task when the job succeeds
        #[arg(long)]
        auto_complete: bool,
    },

    /// Drop a job result for the next bridge pass
    AttachResult {
        worker_task_id: String,
        status: String,

        #[arg(long)]
        summary: Option<String>,
    },

    /// Turn finished results into events
    Bridge,
}

#[derive(Subcommand)]
pub enum HookAction {
    /// Agent session started
    SessionStart {
        session_id: String,

        #[arg(long, env = "FLEET_MEMBER")]
        member: String,

        #[arg(long)]
        pid: Option<u32>,

        #[arg(long)]
        tty: Option<String>,
    },

    /// Liveness, lease renewal, expiry and idle scan
    Heartbeat {
        #[arg(long, env = "FLEET_MEMBER")]
        member: Option<String>,

        /// Repeat every N seconds until interrupted
        #[arg(long = "loop", value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Agent session ended
    SessionEnd {
        #[arg(long, env = "FLEET_MEMBER")]
        member: String,
    },

    /// New events relevant to a session
    SessionEvents { session_id: String },
}

#[derive(Subcommand)]
pub enum CollabAction {
    /// Members with role, presence, status and last activity
    Who,

    /// Snapshots for the next operator
    Handoff {
        #[command(subcommand)]
        action: HandoffAction,
    },

    /// Owners and escalation contacts of the team
    Ownership {
        #[command(subcommand)]
        action: OwnershipAction,
    },

    /// Declare a member's availability
    Presence {
        member: String,

        /// available, busy, away or offline
        presence: Presence,
    },
}

#[derive(Subcommand)]
pub enum HandoffAction {
    /// Snapshot tasks, members and recent events
    Create {
        #[arg(long, default_value = "lead", env = "FLEET_MEMBER")]
        by: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Newest snapshot and what changed since
    Latest,
}

#[derive(Subcommand)]
pub enum OwnershipAction {
    /// Replace owners and escalation contacts
    Set {
        /// Comma-separated owner names
        #[arg(long, value_delimiter = ',', required = true)]
        owners: Vec<String>,

        /// Comma-separated escalation contacts, in order
        #[arg(long, value_delimiter = ',')]
        escalation: Vec<String>,

        #[arg(long)]
        project: Option<String>,
    },

    Get,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_comma_separated_dependencies() {
        let cli = Cli::try_parse_from([
            "fleet",
            "--team",
            "alpha",
            "task",
            "add",
            "Parser",
            "--depends-on",
            "T1,T2",
            "--priority",
            "high",
        ])
        .unwrap();
        assert_eq!(cli.team.as_deref(), Some("alpha"));
        match cli.command {
            Commands::Task {
                action:
                    TaskAction::Add {
                        depends_on,
                        priority,
                        ..
                    },
            } => {
                assert_eq!(depends_on, vec!["T1", "T2"]);
                assert_eq!(priority, Priority::High);
            }
            _ => panic!("expected task add"),
        }
    }

    #[test]
    fn test_parses_ownership_lists() {
        let cli = Cli::try_parse_from([
            "fleet",
            "collab",
            "ownership",
            "set",
            "--owners",
            "dana,lee",
            "--escalation",
            "ops-oncall",
        ])
        .unwrap();
        match cli.command {
            Commands::Collab {
                action:
                    CollabAction::Ownership {
                        action: OwnershipAction::Set { owners, escalation, project },
                    },
            } => {
                assert_eq!(owners, vec!["dana", "lee"]);
                assert_eq!(escalation, vec!["ops-oncall"]);
                assert!(project.is_none());
            }
            _ => panic!("expected collab ownership set"),
        }
    }

    #[test]
    fn test_rejects_unknown_presence() {
        let result = Cli::try_parse_from(["fleet", "collab", "presence", "lead", "asleep"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unknown_preset() {
        let result = Cli::try_parse_from(["fleet", "team", "scale-to-preset", "huge"]);
        assert!(result.is_err());
    }
}
