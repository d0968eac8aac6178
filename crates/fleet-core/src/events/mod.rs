//! Per-team ordered event log and consumer cursors

mod kind;
mod log;

pub use kind::{EventKind, InterruptMode, SESSION_EVENT_TYPES};
pub use log::{Event, EventFilter, EventLog};
