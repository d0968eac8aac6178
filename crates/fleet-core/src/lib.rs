//! Fleet Core Library
//!
//! File-based coordination engine for a small team of autonomous agents:
//! task leases, an ordered event log, idempotent messaging with mailbox
//! fallback, member lifecycle, recovery passes and a budget-aware autoscaler.
//! Every operation is a short synchronous call against a shared
//! [`fleet_store::DocumentStore`].

pub mod clock;
pub mod collab;
pub mod config;
pub mod error;
pub mod events;
pub mod fleet;
pub mod ids;
pub mod lifecycle;
pub mod messaging;
pub mod paths;
pub mod recovery;
pub mod scaling;
pub mod tasks;
pub mod team;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FleetConfig, LogFormat, LoggingConfig, load_config};
pub use error::{FleetError, FleetResult};
pub use events::{Event, EventFilter, EventKind};
pub use fleet::Fleet;
pub use lifecycle::{NewMember, PaneInfo, ProcessHost, SpawnOptions, TmuxHost};
pub use messaging::{Priority, SendRequest};
pub use recovery::DoctorReport;
pub use scaling::{BootstrapChoice, CostAccounting, Decision, Preset};
pub use tasks::{NewTask, Task, TaskStatus, Template};
pub use team::{Member, MemberKind, MemberStatus, NewTeam, Team, TeamScope};
