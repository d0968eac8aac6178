//! Member and worker lifecycle, agent hooks and the process host seam

mod hooks;
mod host;
mod members;
mod tmux;
mod workers;

pub use hooks::HeartbeatReport;
#[cfg(test)]
pub use host::MockProcessHost;
pub use host::{PaneInfo, ProcessHost};
pub use members::{
    AttachOutcome, Lifecycle, NewMember, ReplaceOutcome, RestartOutcome, SpawnOptions,
};
pub use tmux::TmuxHost;
pub use workers::{WorkerBinding, WorkerBoard, WorkerBridge, WorkerResult};
