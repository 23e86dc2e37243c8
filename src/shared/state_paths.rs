use super::errors::StateError;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_STATE_ROOT_DIR: &str = ".banhammer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.root.join("logs"), self.root.join("data")]
    }

    pub fn runtime_log_path(&self) -> PathBuf {
        self.root.join("logs/runtime.log")
    }

    pub fn overrides_db_path(&self) -> PathBuf {
        self.root.join("data/overrides.sqlite3")
    }
}

pub fn default_state_root_path() -> Result<PathBuf, StateError> {
    let home = std::env::var_os("HOME").ok_or(StateError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(DEFAULT_STATE_ROOT_DIR))
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), StateError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| StateError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
