//! File-based configuration loading

use super::FleetConfig;
use crate::error::{FleetError, FleetResult};
use std::fs;
use std::path::Path;

/// Load configuration from a file
///
/// Supports JSON, TOML, and YAML formats based on file extension.
/// Returns default config if file doesn't exist.
pub fn load_from_file(path: &Path) -> FleetResult<FleetConfig> {
    if !path.exists() {
        return Ok(FleetConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        FleetError::config_with_context(
            format!("Failed to read config file: {}", e),
            format!("Reading configuration from '{}'", path.display()),
        )
    })?;

    let config: FleetConfig = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            FleetError::config_with_context(
                format!("Failed to parse TOML config: {}", e),
                format!("Deserializing TOML configuration from '{}'", path.display()),
            )
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
            FleetError::config_with_context(
                format!("Failed to parse YAML config: {}", e),
                format!("Deserializing YAML configuration from '{}'", path.display()),
            )
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            FleetError::config_with_context(
                format!("Failed to parse JSON config: {}", e),
                format!("Deserializing JSON configuration from '{}'", path.display()),
            )
        })?,
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::Preset;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
claim_ttl_secs = 60
default_preset = "lite"

[[preset_profile]]
max_pct = 20.0
preset = "heavy"

[logging]
level = "debug"
format = "json"
log_to_file = true
"#,
        )
        .unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.claim_ttl_secs, 60);
        assert_eq!(config.default_preset, Preset::Lite);
        assert_eq!(config.preset_profile.len(), 1);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, crate::config::LogFormat::Json);
        assert_eq!(
            config.logging.file_path(dir.path()),
            Some(dir.path().join("logs/fleet.log"))
        );
        // untouched keys keep defaults
        assert_eq!(config.event_keep, 1000);
    }

    #[test]
    fn test_load_yaml_and_json() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("config.yaml");
        fs::write(&yaml, "event_keep: 50\nsession_prefix: crew-\n").unwrap();
        let config = load_from_file(&yaml).unwrap();
        assert_eq!(config.event_keep, 50);
        assert_eq!(config.session_name("a"), "crew-a");

        let json = dir.path().join("config.json");
        fs::write(&json, r#"{"idle_threshold_secs": 30}"#).unwrap();
        assert_eq!(load_from_file(&json).unwrap().idle_threshold_secs, 30);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FleetConfig::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "claim_ttl_secs = \"soon\"").unwrap();
        assert!(matches!(
            load_from_file(&path),
            Err(FleetError::Config { .. })
        ));
    }
}
