//! Logging settings for the `fleet` binary

use crate::error::{FleetError, FleetResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log file used when `log_to_file` is set without a path, relative to the fleet home
pub const DEFAULT_LOG_FILE: &str = "logs/fleet.log";

/// Crates whose level follows the configured one; everything else stays at `warn`
const FLEET_TARGETS: [&str; 3] = ["fleet", "fleet_core", "fleet_store"];

/// Line format of the subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Logging configuration, the `[logging]` table of `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for fleet's own crates (trace, debug, info, warn, error)
    pub level: String,
    /// Write to a file instead of stderr
    pub log_to_file: bool,
    /// Relative paths resolve against the fleet home
    pub log_file: Option<PathBuf>,
    pub log_to_console: bool,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            log_to_file: false,
            log_file: None,
            log_to_console: true,
            format: LogFormat::Compact,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> FleetResult<()> {
        let level = self.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(FleetError::config_with_context(
                format!("Unknown log level '{}'", self.level),
                format!("expected one of {}", LEVELS.join(", ")),
            ));
        }
        Ok(())
    }

    /// No subscriber at all
    pub fn is_silent(&self) -> bool {
        !self.log_to_console && !self.log_to_file
    }

    /// `EnvFilter` directive; `verbose` raises fleet's crates to `debug`
    pub fn directive(&self, verbose: bool) -> String {
        let level = if verbose {
            "debug".to_string()
        } else {
            self.level.to_ascii_lowercase()
        };
        let mut parts = vec!["warn".to_string()];
        parts.extend(FLEET_TARGETS.iter().map(|target| format!("{}={}", target, level)));
        parts.join(",")
    }

    /// Log file for this home, when file output is enabled
    pub fn file_path(&self, home: &Path) -> Option<PathBuf> {
        if !self.log_to_file {
            return None;
        }
        let path = self
            .log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        Some(if path.is_absolute() { path } else { home.join(path) })
    }
}
