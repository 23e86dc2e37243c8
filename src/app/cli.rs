#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Run,
    CheckConfig,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "run" => CliVerb::Run,
        "check-config" => CliVerb::CheckConfig,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  run                                  Connect to Discord and serve massban commands"
            .to_string(),
        "  check-config                         Load and validate settings, print resolved values"
            .to_string(),
        "  help                                 Show this message".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    let mut lines = cli_help_lines();
    lines.push(String::new());
    lines.push("Environment:".to_string());
    lines.push(format!(
        "  {:36} Settings file path (default ~/.banhammer/config.yaml)",
        crate::config::CONFIG_PATH_ENV
    ));
    lines.push(format!(
        "  {:36} Bot token (variable name set by discord.token_env)",
        crate::config::DEFAULT_TOKEN_ENV
    ));
    lines.join("\n")
}
