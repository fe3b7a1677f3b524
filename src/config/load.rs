use std::fs;
use std::path::Path;

use super::error::ConfigError;
use super::types::EngineConfig;

/// Loads the engine configuration; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => EngineConfig::from_toml_str(&contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("no config at {}, using defaults", path.display());
            Ok(EngineConfig::default())
        }
        Err(err) => Err(ConfigError::Io(err)),
    }
}
