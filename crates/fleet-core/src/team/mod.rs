//! Team namespace: documents, registry and lifecycle of the team itself

mod model;
mod registry;
mod scope;

pub use model::{
    Binding, IndexEntry, Member, MemberKind, MemberStatus, Ownership, Presence, Role,
    RuntimeState, SessionRecord, SpawnMode, Team, TeamIndex, TeamState,
};
pub use registry::{Dashboard, GcReport, NewTeam, TeamStatus, TeardownSummary};
pub use scope::TeamScope;

pub(crate) use registry::task_counts;
