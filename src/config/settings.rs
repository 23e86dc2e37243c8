use super::ConfigError;
use crate::shared::{default_state_root_path, StatePaths};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_REASON_CHARS_CEILING: usize = 512;
pub const MAX_CONFIRMATION_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_TOKEN_ENV: &str = "DISCORD_TOKEN";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub state_root: Option<PathBuf>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_max_reason_chars")]
    pub max_reason_chars: usize,
    #[serde(default)]
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_root: None,
            command_prefix: default_command_prefix(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            max_reason_chars: default_max_reason_chars(),
            discord: DiscordConfig::default(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            api_base: default_api_base(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

fn default_command_prefix() -> String {
    "bh!".to_string()
}

fn default_confirmation_timeout_secs() -> u64 {
    600
}

fn default_max_reason_chars() -> usize {
    MAX_REASON_CHARS_CEILING
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_reconnect_backoff_ms() -> u64 {
    2000
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::Settings(
                "command_prefix must be non-empty".to_string(),
            ));
        }
        if self.command_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Settings(
                "command_prefix must not contain whitespace".to_string(),
            ));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Settings(
                "confirmation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.confirmation_timeout_secs > MAX_CONFIRMATION_TIMEOUT_SECS {
            return Err(ConfigError::Settings(format!(
                "confirmation_timeout_secs must be at most {MAX_CONFIRMATION_TIMEOUT_SECS}"
            )));
        }
        if self.max_reason_chars == 0 || self.max_reason_chars > MAX_REASON_CHARS_CEILING {
            return Err(ConfigError::Settings(format!(
                "max_reason_chars must be between 1 and {MAX_REASON_CHARS_CEILING}"
            )));
        }
        if self.discord.token_env.trim().is_empty() {
            return Err(ConfigError::Settings(
                "discord.token_env must be non-empty".to_string(),
            ));
        }
        if !self.discord.api_base.starts_with("http://")
            && !self.discord.api_base.starts_with("https://")
        {
            return Err(ConfigError::Settings(
                "discord.api_base must be an http(s) url".to_string(),
            ));
        }
        Ok(())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn resolve_state_paths(&self) -> Result<StatePaths, ConfigError> {
        match &self.state_root {
            Some(root) => Ok(StatePaths::new(root.clone())),
            None => default_state_root_path()
                .map(StatePaths::new)
                .map_err(|_| ConfigError::HomeDirectoryUnavailable),
        }
    }

    pub fn discord_token(&self) -> Result<String, ConfigError> {
        std::env::var(&self.discord.token_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(self.discord.token_env.clone()))
    }
}
