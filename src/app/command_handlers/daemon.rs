use crate::app::command_support::{ensure_runtime_root, load_settings, map_config_err};
use crate::app::engine::{Engine, EngineConfig, EngineDeps};
use crate::channels::discord::{run_gateway, DiscordClient, GatewayOptions};
use crate::massban::HttpSourceFetcher;
use crate::permissions::SqliteOverrideStore;
use crate::shared::{append_runtime_log_fields, LogLevel};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub fn cmd_run() -> Result<String, String> {
    let settings = load_settings()?;
    let paths = ensure_runtime_root(&settings)?;
    let token = settings.discord_token().map_err(map_config_err)?;

    let overrides =
        SqliteOverrideStore::open(&paths.overrides_db_path()).map_err(|e| e.to_string())?;
    let client = Arc::new(DiscordClient::new(
        settings.discord.api_base.clone(),
        token.clone(),
    ));
    let engine = Arc::new(Engine::new(
        EngineConfig::from_settings(&settings),
        EngineDeps {
            transport: client.clone(),
            action: client.clone(),
            fetcher: Arc::new(HttpSourceFetcher::default()),
            overrides: Arc::new(overrides),
        },
        paths.clone(),
    ));

    let timeout_secs = settings.confirmation_timeout_secs.to_string();
    append_runtime_log_fields(
        &paths,
        LogLevel::Info,
        "runtime.start",
        "starting gateway",
        &[
            ("command_prefix", settings.command_prefix.as_str()),
            ("confirmation_timeout_secs", timeout_secs.as_str()),
        ],
    );

    let stop = AtomicBool::new(false);
    let options = GatewayOptions {
        token,
        reconnect_backoff: Duration::from_millis(settings.discord.reconnect_backoff_ms),
    };
    run_gateway(&client, &engine, &paths, &options, &stop).map_err(|e| e.to_string())?;

    append_runtime_log_fields(&paths, LogLevel::Info, "runtime.stop", "gateway stopped", &[]);
    Ok(format!("stopped\nstate_root={}", paths.root.display()))
}
