//! tmux-backed process host

use super::host::{PaneInfo, ProcessHost};
use crate::error::{FleetError, FleetResult};
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

const PANE_FORMAT: &str = "#{pane_id}\t#{pane_tty}";

/// Drives a local tmux server through its CLI
#[derive(Debug, Clone)]
pub struct TmuxHost {
    binary: String,
}

impl TmuxHost {
    pub fn new() -> Self {
        Self {
            binary: "tmux".to_string(),
        }
    }

    /// Use a different tmux binary (or wrapper script)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> FleetResult<Output> {
        debug!("{} {}", self.binary, args.join(" "));
        Command::new(&self.binary).args(args).output().map_err(|e| {
            FleetError::host_with_context(
                format!("Failed to run {}: {}", self.binary, e),
                args.join(" "),
            )
        })
    }

    fn run_ok(&self, args: &[&str]) -> FleetResult<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(FleetError::host_with_context(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
                args.join(" "),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse_panes(stdout: &str) -> Vec<PaneInfo> {
        stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                let mut parts = line.splitn(2, '\t');
                let pane_id = parts.next().unwrap_or_default().trim().to_string();
                let tty = parts
                    .next()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                PaneInfo { pane_id, tty }
            })
            .filter(|p| !p.pane_id.is_empty())
            .collect()
    }

    fn first_pane(stdout: &str, what: &str) -> FleetResult<PaneInfo> {
        Self::parse_panes(stdout)
            .into_iter()
            .next()
            .ok_or_else(|| FleetError::host(format!("tmux {} returned no pane", what)))
    }
}

impl Default for TmuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for TmuxHost {
    fn has_session(&self, session: &str) -> bool {
        self.run(&["has-session", "-t", session])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn create_session(&self, session: &str, cwd: &Path) -> FleetResult<()> {
        let cwd = cwd.to_string_lossy();
        self.run_ok(&["new-session", "-d", "-s", session, "-c", &cwd])?;
        Ok(())
    }

    fn kill_session(&self, session: &str) -> FleetResult<()> {
        self.run_ok(&["kill-session", "-t", session])?;
        Ok(())
    }

    fn split_pane(&self, session: &str, cwd: &Path) -> FleetResult<PaneInfo> {
        let cwd = cwd.to_string_lossy();
        let out = self.run_ok(&[
            "split-window", "-t", session, "-c", &cwd, "-P", "-F", PANE_FORMAT,
        ])?;
        Self::first_pane(&out, "split-window")
    }

    fn new_window(&self, session: &str, cwd: &Path) -> FleetResult<PaneInfo> {
        let cwd = cwd.to_string_lossy();
        let out = self.run_ok(&[
            "new-window", "-t", session, "-c", &cwd, "-P", "-F", PANE_FORMAT,
        ])?;
        Self::first_pane(&out, "new-window")
    }

    fn send_keys(&self, pane_id: &str, keys: &str, enter: bool) -> FleetResult<()> {
        if enter {
            self.run_ok(&["send-keys", "-t", pane_id, "-l", keys])?;
            self.run_ok(&["send-keys", "-t", pane_id, "Enter"])?;
        } else {
            self.run_ok(&["send-keys", "-t", pane_id, keys])?;
        }
        Ok(())
    }

    fn kill_pane(&self, pane_id: &str) -> FleetResult<()> {
        self.run_ok(&["kill-pane", "-t", pane_id])?;
        Ok(())
    }

    fn list_panes(&self, session: &str) -> FleetResult<Vec<PaneInfo>> {
        if !self.has_session(session) {
            return Ok(Vec::new());
        }
        let out = self.run_ok(&["list-panes", "-s", "-t", session, "-F", PANE_FORMAT])?;
        Ok(Self::parse_panes(&out))
    }

    fn select_pane(&self, pane_id: &str) -> FleetResult<()> {
        self.run_ok(&["select-window", "-t", pane_id])?;
        self.run_ok(&["select-pane", "-t", pane_id])?;
        Ok(())
    }

    #[cfg(unix)]
    fn interrupt_process(&self, pid: u32) -> FleetResult<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| FleetError::host(format!("Invalid pid {}", pid)))?;
        kill(Pid::from_raw(raw), Signal::SIGINT)
            .map_err(|e| FleetError::host(format!("Failed to signal pid {}: {}", pid, e)))
    }

    #[cfg(not(unix))]
    fn interrupt_process(&self, pid: u32) -> FleetResult<()> {
        Err(FleetError::host(format!(
            "Signals are not supported on this platform (pid {})",
            pid
        )))
    }
}
