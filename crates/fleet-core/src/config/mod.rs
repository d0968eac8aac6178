//! Configuration: defaults, then an optional file, then `FLEET_*` environment overrides

mod env_loader;
mod file_loader;
mod logging_config;
mod model;

pub use env_loader::apply_env_overrides;
pub use file_loader::load_from_file;
pub use logging_config::{DEFAULT_LOG_FILE, LogFormat, LoggingConfig};
pub use model::{FleetConfig, PresetRule};

use crate::error::FleetResult;
use std::path::Path;

/// Load the layered configuration.
///
/// The file is `explicit` when given, otherwise `<home>/config.toml` where home
/// comes from `FLEET_HOME` or the default state root.
pub fn load_config(explicit: Option<&Path>) -> FleetResult<FleetConfig> {
    let mut config = match explicit {
        Some(path) => load_from_file(path)?,
        None => {
            let mut env_only = FleetConfig::default();
            apply_env_overrides(&mut env_only)?;
            load_from_file(&env_only.home_dir()?.join("config.toml"))?
        }
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}
