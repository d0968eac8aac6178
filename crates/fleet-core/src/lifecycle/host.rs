//! Process host interface
//!
//! Lifecycle logic only talks to a multiplexer through this trait.

use crate::error::FleetResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A hosted pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneInfo {
    pub pane_id: String,
    pub tty: Option<String>,
}

/// Multiplexer and process primitives used to host members
#[cfg_attr(test, mockall::automock)]
pub trait ProcessHost: Send + Sync {
    fn has_session(&self, session: &str) -> bool;

    fn create_session(&self, session: &str, cwd: &Path) -> FleetResult<()>;

    fn kill_session(&self, session: &str) -> FleetResult<()>;

    /// Split an existing window of `session`
    fn split_pane(&self, session: &str, cwd: &Path) -> FleetResult<PaneInfo>;

    /// Open a new window in `session`
    fn new_window(&self, session: &str, cwd: &Path) -> FleetResult<PaneInfo>;

    /// With `enter`, type `keys` literally and press Enter; otherwise send
    /// `keys` as a key name such as `C-c`.
    fn send_keys(&self, pane_id: &str, keys: &str, enter: bool) -> FleetResult<()>;

    fn kill_pane(&self, pane_id: &str) -> FleetResult<()>;

    /// Panes of `session`; empty when the session does not exist
    fn list_panes(&self, session: &str) -> FleetResult<Vec<PaneInfo>>;

    fn select_pane(&self, pane_id: &str) -> FleetResult<()>;

    /// Deliver SIGINT to a tracked process
    fn interrupt_process(&self, pid: u32) -> FleetResult<()>;
}
