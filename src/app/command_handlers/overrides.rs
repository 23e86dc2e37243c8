use crate::app::chat_commands::parse_override_target;
use crate::app::engine::{Engine, EngineError};
use crate::app::render;
use crate::channels::{CommandEvent, Reply};
use crate::permissions::{AccessLevel, OverrideSubject};
use crate::shared::LogLevel;

const STORE_FAILURE: &str = ":x: Could not save the permission change. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideChange {
    Grant,
    Revoke,
}

impl OverrideChange {
    fn verb(self) -> &'static str {
        match self {
            Self::Grant => "allow",
            Self::Revoke => "deny",
        }
    }
}

fn mention(subject: &OverrideSubject) -> String {
    match subject {
        OverrideSubject::User(id) => format!("<@{id}>"),
        OverrideSubject::Role(id) => format!("<@&{id}>"),
    }
}

fn change_text(subject: &OverrideSubject, change: OverrideChange, changed: bool) -> String {
    let mention = mention(subject);
    match (change, changed) {
        (OverrideChange::Grant, true) => {
            format!(":white_check_mark: {mention} can now run massbans.")
        }
        (OverrideChange::Grant, false) => format!("{mention} can already run massbans."),
        (OverrideChange::Revoke, true) => {
            format!(":white_check_mark: {mention} can no longer run massbans.")
        }
        (OverrideChange::Revoke, false) => format!("{mention} had no massban access to remove."),
    }
}

pub(crate) fn handle_override_change(
    engine: &Engine,
    event: &CommandEvent,
    args: &str,
    change: OverrideChange,
) -> Result<(), EngineError> {
    let transport = &engine.deps.transport;
    match engine.access(&event.actor, &event.tenant_id)? {
        AccessLevel::Denied => return Ok(()),
        AccessLevel::Granted => {
            transport.reply(event, &Reply::text(render::ADMIN_ONLY))?;
            return Ok(());
        }
        AccessLevel::Admin => {}
    }

    let subject = match parse_override_target(args) {
        Ok(subject) => subject,
        Err(err) => {
            let prefix = &engine.config.command_prefix;
            transport.reply(event, &Reply::text(err.user_message(prefix, change.verb())))?;
            return Ok(());
        }
    };

    let store = &engine.deps.overrides;
    let result = match change {
        OverrideChange::Grant => store.grant(&event.tenant_id, &subject),
        OverrideChange::Revoke => store.revoke(&event.tenant_id, &subject),
    };
    let changed = match result {
        Ok(changed) => changed,
        Err(err) => {
            transport.reply(event, &Reply::text(STORE_FAILURE))?;
            return Err(err.into());
        }
    };

    engine.log_fields(
        LogLevel::Info,
        "overrides.changed",
        change.verb(),
        &[
            ("tenant_id", event.tenant_id.as_str()),
            ("kind", subject.kind().as_str()),
            ("subject_id", subject.id()),
            ("changed", if changed { "true" } else { "false" }),
        ],
    );
    transport.reply(event, &Reply::text(change_text(&subject, change, changed)))?;
    Ok(())
}

pub(crate) fn handle_list(engine: &Engine, event: &CommandEvent) -> Result<(), EngineError> {
    if !engine.authorized(&event.actor, &event.tenant_id)? {
        return Ok(());
    }
    let record = engine.deps.overrides.get(&event.tenant_id)?;
    engine
        .deps
        .transport
        .reply(event, &render::overrides_listing(record.as_ref()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{RoleId, UserId};

    #[test]
    fn change_text_reflects_idempotent_outcomes() {
        let user = OverrideSubject::User(UserId::parse("5").expect("user"));
        let role = OverrideSubject::Role(RoleId::parse("6").expect("role"));
        assert_eq!(
            change_text(&user, OverrideChange::Grant, true),
            ":white_check_mark: <@5> can now run massbans."
        );
        assert_eq!(
            change_text(&role, OverrideChange::Grant, false),
            "<@&6> can already run massbans."
        );
        assert_eq!(
            change_text(&role, OverrideChange::Revoke, false),
            "<@&6> had no massban access to remove."
        );
    }
}
