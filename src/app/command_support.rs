use crate::config::{load_global_settings, ConfigError, Settings};
use crate::shared::{bootstrap_state_root, StatePaths};

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn load_settings() -> Result<Settings, String> {
    load_global_settings().map_err(map_config_err)
}

pub fn ensure_runtime_root(settings: &Settings) -> Result<StatePaths, String> {
    let paths = settings.resolve_state_paths().map_err(map_config_err)?;
    bootstrap_state_root(&paths).map_err(|e| e.to_string())?;
    Ok(paths)
}
