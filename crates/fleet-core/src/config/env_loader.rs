//! Environment variable overrides
//!
//! `FLEET_HOME`, `FLEET_LOG_LEVEL`, `FLEET_CLAIM_TTL`, `FLEET_AGENT_COMMAND`,
//! `FLEET_SESSION_PREFIX`, `FLEET_DEFAULT_PRESET`.

use super::FleetConfig;
use crate::error::{FleetError, FleetResult};
use std::env;
use std::path::PathBuf;

/// Apply `FLEET_*` environment variables on top of `config`
pub fn apply_env_overrides(config: &mut FleetConfig) -> FleetResult<()> {
    if let Ok(home) = env::var("FLEET_HOME") {
        if !home.is_empty() {
            config.home = Some(PathBuf::from(home));
        }
    }

    if let Ok(level) = env::var("FLEET_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Ok(ttl) = env::var("FLEET_CLAIM_TTL") {
        config.claim_ttl_secs = ttl
            .parse()
            .map_err(|_| FleetError::config("Invalid FLEET_CLAIM_TTL value"))?;
    }

    if let Ok(command) = env::var("FLEET_AGENT_COMMAND") {
        config.agent_command = command;
    }

    if let Ok(prefix) = env::var("FLEET_SESSION_PREFIX") {
        config.session_prefix = prefix;
    }

    if let Ok(preset) = env::var("FLEET_DEFAULT_PRESET") {
        config.default_preset = preset
            .parse()
            .map_err(|_| FleetError::config("Invalid FLEET_DEFAULT_PRESET value"))?;
    }

    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::Preset;
    use serial_test::serial;

    fn clear() {
        for key in [
            "FLEET_HOME",
            "FLEET_LOG_LEVEL",
            "FLEET_CLAIM_TTL",
            "FLEET_AGENT_COMMAND",
            "FLEET_SESSION_PREFIX",
            "FLEET_DEFAULT_PRESET",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear();
        unsafe {
            env::set_var("FLEET_HOME", "/tmp/fleet-env-test");
            env::set_var("FLEET_CLAIM_TTL", "120");
            env::set_var("FLEET_DEFAULT_PRESET", "heavy");
        }

        let mut config = FleetConfig::default();
        apply_env_overrides(&mut config).unwrap();
        assert_eq!(config.home, Some(PathBuf::from("/tmp/fleet-env-test")));
        assert_eq!(config.claim_ttl_secs, 120);
        assert_eq!(config.default_preset, Preset::Heavy);
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_ttl_rejected() {
        clear();
        unsafe { env::set_var("FLEET_CLAIM_TTL", "forever") };

        let mut config = FleetConfig::default();
        assert!(apply_env_overrides(&mut config).is_err());
        clear();
    }

    #[test]
    #[serial]
    fn test_log_level_override_is_validated() {
        clear();
        unsafe { env::set_var("FLEET_LOG_LEVEL", "debug") };
        let mut config = FleetConfig::default();
        apply_env_overrides(&mut config).unwrap();
        assert_eq!(config.logging.level, "debug");

        unsafe { env::set_var("FLEET_LOG_LEVEL", "chatty") };
        let mut config = FleetConfig::default();
        assert!(apply_env_overrides(&mut config).is_err());
        clear();
    }
}
