use crate::permissions::{OverrideKind, OverrideSubject};
use crate::shared::{RoleId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    Massban(&'a str),
    Allow(&'a str),
    Deny(&'a str),
    List,
    Help,
}

pub fn parse_chat_command<'a>(prefix: &str, text: &'a str) -> Option<ChatCommand<'a>> {
    let body = text.trim_start().strip_prefix(prefix)?;
    let (name, args) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim()),
        None => (body, ""),
    };
    match name.to_ascii_lowercase().as_str() {
        "massban" => Some(ChatCommand::Massban(args)),
        "allow" => Some(ChatCommand::Allow(args)),
        "deny" => Some(ChatCommand::Deny(args)),
        "list" => Some(ChatCommand::List),
        "help" => Some(ChatCommand::Help),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideArgsError {
    #[error("expected `<user|role> <id>`, got {0} argument(s)")]
    ArgumentCount(usize),
    #[error("unknown override kind `{0}`")]
    UnknownKind(String),
    #[error("`{target}` is not a valid {kind} id or mention")]
    InvalidTarget { kind: OverrideKind, target: String },
}

impl OverrideArgsError {
    pub fn user_message(&self, prefix: &str, verb: &str) -> String {
        let usage = format!(
            "Usage: `{prefix}{verb} user <@user|id>` or `{prefix}{verb} role <@&role|id>`"
        );
        match self {
            Self::InvalidTarget { kind, target } => {
                format!(":x: `{target}` is not a valid {kind}. {usage}")
            }
            _ => format!(":x: {usage}"),
        }
    }
}

fn strip_mention(kind: OverrideKind, target: &str) -> &str {
    let inner = target
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'));
    match (kind, inner) {
        (OverrideKind::User, Some(inner)) => inner.strip_prefix('!').unwrap_or(inner),
        (OverrideKind::Role, Some(inner)) => inner.strip_prefix('&').unwrap_or(target),
        (_, None) => target,
    }
}

pub fn parse_override_target(args: &str) -> Result<OverrideSubject, OverrideArgsError> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let [kind, target] = tokens.as_slice() else {
        return Err(OverrideArgsError::ArgumentCount(tokens.len()));
    };
    let kind =
        OverrideKind::parse(kind).map_err(|_| OverrideArgsError::UnknownKind(kind.to_string()))?;
    let raw_id = strip_mention(kind, target);
    let invalid = |_| OverrideArgsError::InvalidTarget {
        kind,
        target: target.to_string(),
    };
    match kind {
        OverrideKind::User => UserId::parse(raw_id).map(OverrideSubject::User).map_err(invalid),
        OverrideKind::Role => RoleId::parse(raw_id).map(OverrideSubject::Role).map_err(invalid),
    }
}

pub fn chat_help_lines(prefix: &str) -> Vec<String> {
    vec![
        format!("`{prefix}massban [days] <url> [reason]` ban every ID found at a public URL"),
        format!(
            "`{prefix}massban [days] [reason]` with one attached file: ban every ID in the file"
        ),
        "  days: 0-7 days of messages to delete, reason: up to 512 characters".to_string(),
        format!(
            "`{prefix}allow user|role <mention|id>` let a user or role run massbans (admins only)"
        ),
        format!("`{prefix}deny user|role <mention|id>` revoke that access (admins only)"),
        format!("`{prefix}list` show users and roles allowed to run massbans"),
        format!("`{prefix}help` show this message"),
    ]
}
