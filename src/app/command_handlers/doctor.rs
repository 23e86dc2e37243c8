use crate::app::command_support::{load_settings, map_config_err};
use crate::config::default_global_config_path;

pub fn cmd_check_config() -> Result<String, String> {
    let config_path = default_global_config_path().map_err(map_config_err)?;
    let settings = load_settings()?;
    let paths = settings.resolve_state_paths().map_err(map_config_err)?;
    let token = if settings.discord_token().is_ok() {
        "present"
    } else {
        "missing"
    };

    Ok([
        "config_ok=true".to_string(),
        format!("config_path={}", config_path.display()),
        format!("config_file_present={}", config_path.exists()),
        format!("state_root={}", paths.root.display()),
        format!("command_prefix={}", settings.command_prefix),
        format!(
            "confirmation_timeout_secs={}",
            settings.confirmation_timeout_secs
        ),
        format!("max_reason_chars={}", settings.max_reason_chars),
        format!("discord.api_base={}", settings.discord.api_base),
        format!(
            "discord.token_env={} ({token})",
            settings.discord.token_env
        ),
        format!(
            "discord.reconnect_backoff_ms={}",
            settings.discord.reconnect_backoff_ms
        ),
    ]
    .join("\n"))
}
