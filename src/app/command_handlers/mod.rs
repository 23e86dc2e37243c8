use crate::app::chat_commands::chat_help_lines;
use crate::app::cli::{help_text, parse_cli_verb, CliVerb};
use crate::app::engine::{Engine, EngineError};
use crate::app::render;
use crate::channels::CommandEvent;

pub mod daemon;
pub mod doctor;
pub mod massban;
pub mod overrides;
pub mod signals;

pub use overrides::OverrideChange;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Run => daemon::cmd_run(),
        CliVerb::CheckConfig => doctor::cmd_check_config(),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}

pub(crate) fn handle_help(engine: &Engine, event: &CommandEvent) -> Result<(), EngineError> {
    if !engine.authorized(&event.actor, &event.tenant_id)? {
        return Ok(());
    }
    let lines = chat_help_lines(&engine.config.command_prefix);
    engine.deps.transport.reply(event, &render::help(&lines))?;
    Ok(())
}
