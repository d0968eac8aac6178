//! Configuration model

use super::LoggingConfig;
use crate::error::{FleetError, FleetResult};
use crate::scaling::Preset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One step of the bootstrap budget profile: use `preset` while spend is at or below `max_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRule {
    pub max_pct: f64,
    pub preset: Preset,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// State root; `~/.fleet` when unset
    pub home: Option<PathBuf>,
    /// Default lease length for task claims
    pub claim_ttl_secs: u64,
    /// Message expiry
    pub message_ttl_secs: u64,
    /// Events kept by compaction
    pub event_keep: usize,
    /// A member without a heartbeat for this long counts as idle
    pub idle_threshold_secs: u64,
    /// Minimum gap between two `TeammateIdle` events for one member
    pub idle_cooldown_secs: u64,
    /// Unacknowledged messages older than this are stale
    pub stale_message_secs: u64,
    /// Multiplexer session name prefix
    pub session_prefix: String,
    /// Agent binary launched in spawned panes
    pub agent_command: String,
    /// Preset used when no budget is configured
    pub default_preset: Preset,
    /// Ordered budget rules for bootstrap; first match wins
    pub preset_profile: Vec<PresetRule>,
    /// Preset when no rule matches
    pub profile_fallback: Preset,
    pub logging: LoggingConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            home: None,
            claim_ttl_secs: 900,
            message_ttl_secs: 86_400,
            event_keep: 1000,
            idle_threshold_secs: 180,
            idle_cooldown_secs: 300,
            stale_message_secs: 300,
            session_prefix: "fleet-".to_string(),
            agent_command: "claude".to_string(),
            default_preset: Preset::Standard,
            preset_profile: vec![
                PresetRule {
                    max_pct: 40.0,
                    preset: Preset::Heavy,
                },
                PresetRule {
                    max_pct: 75.0,
                    preset: Preset::Standard,
                },
            ],
            profile_fallback: Preset::Lite,
            logging: LoggingConfig::default(),
        }
    }
}

impl FleetConfig {
    /// Resolve the state root, expanding `~`
    pub fn home_dir(&self) -> FleetResult<PathBuf> {
        match &self.home {
            Some(path) => {
                let raw = path.to_string_lossy();
                Ok(PathBuf::from(shellexpand::tilde(&raw).into_owned()))
            }
            None => dirs::home_dir()
                .map(|h| h.join(".fleet"))
                .ok_or_else(|| FleetError::config("Cannot determine home directory")),
        }
    }

    /// Multiplexer session name for a team
    pub fn session_name(&self, team_id: &str) -> String {
        format!("{}{}", self.session_prefix, team_id)
    }

    /// Reject values that would break lease or compaction semantics
    pub fn validate(&self) -> FleetResult<()> {
        if self.claim_ttl_secs == 0 {
            return Err(FleetError::config("claim_ttl_secs must be greater than zero"));
        }
        if self.event_keep == 0 {
            return Err(FleetError::config("event_keep must be greater than zero"));
        }
        if self.session_prefix.is_empty() {
            return Err(FleetError::config("session_prefix must not be empty"));
        }
        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FleetConfig::default();
        assert_eq!(config.claim_ttl_secs, 900);
        assert_eq!(config.event_keep, 1000);
        assert_eq!(config.session_name("alpha"), "fleet-alpha");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_home_dir_expands_tilde() {
        let config = FleetConfig {
            home: Some(PathBuf::from("~/fleet-state")),
            ..Default::default()
        };
        let home = config.home_dir().unwrap();
        assert!(!home.to_string_lossy().starts_with('~'));
        assert!(home.ends_with("fleet-state"));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = FleetConfig {
            claim_ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
