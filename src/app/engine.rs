use super::chat_commands::{parse_chat_command, ChatCommand};
use super::command_handlers::{self, OverrideChange};
use crate::channels::{ChatTransport, CommandEvent, InboundEvent, InteractionRef, TransportError};
use crate::config::Settings;
use crate::massban::{BanAction, ConfirmationRouter, JobError, JobRegistry, SourceFetcher};
use crate::permissions::{
    is_authorized, resolve_access, AccessLevel, Actor, OverrideStore, OverrideStoreError,
};
use crate::shared::{append_runtime_log_fields, LogLevel, StatePaths, TenantId};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub command_prefix: String,
    pub confirmation_timeout: Duration,
    pub max_reason_chars: usize,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            command_prefix: settings.command_prefix.clone(),
            confirmation_timeout: settings.confirmation_timeout(),
            max_reason_chars: settings.max_reason_chars,
        }
    }
}

#[derive(Clone)]
pub struct EngineDeps {
    pub transport: Arc<dyn ChatTransport>,
    pub action: Arc<dyn BanAction>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub overrides: Arc<dyn OverrideStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Overrides(#[from] OverrideStoreError),
    #[error(transparent)]
    Job(#[from] JobError),
}

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) deps: EngineDeps,
    pub(crate) state_paths: StatePaths,
    pub(crate) jobs: JobRegistry,
    pub(crate) confirmations: ConfirmationRouter<InteractionRef>,
}

impl Engine {
    pub fn new(config: EngineConfig, deps: EngineDeps, state_paths: StatePaths) -> Self {
        Self {
            config,
            deps,
            state_paths,
            jobs: JobRegistry::default(),
            confirmations: ConfirmationRouter::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn confirmations(&self) -> &ConfirmationRouter<InteractionRef> {
        &self.confirmations
    }

    pub fn handle_event(self: &Arc<Self>, event: InboundEvent) -> Option<JoinHandle<()>> {
        let result = match event {
            InboundEvent::Command(command) => self.handle_command(&command),
            InboundEvent::Signal(signal) => {
                command_handlers::signals::handle_signal(self, &signal).map(|()| None)
            }
        };
        match result {
            Ok(worker) => worker,
            Err(err) => {
                self.log(LogLevel::Error, "handler.error", &err.to_string());
                None
            }
        }
    }

    pub fn handle_command(
        self: &Arc<Self>,
        event: &CommandEvent,
    ) -> Result<Option<JoinHandle<()>>, EngineError> {
        let Some(command) = parse_chat_command(&self.config.command_prefix, &event.text) else {
            return Ok(None);
        };
        match command {
            ChatCommand::Massban(args) => {
                command_handlers::massban::handle_massban(self, event, args)
            }
            ChatCommand::Allow(args) => command_handlers::overrides::handle_override_change(
                self,
                event,
                args,
                OverrideChange::Grant,
            )
            .map(|()| None),
            ChatCommand::Deny(args) => command_handlers::overrides::handle_override_change(
                self,
                event,
                args,
                OverrideChange::Revoke,
            )
            .map(|()| None),
            ChatCommand::List => {
                command_handlers::overrides::handle_list(self, event).map(|()| None)
            }
            ChatCommand::Help => command_handlers::handle_help(self, event).map(|()| None),
        }
    }

    pub(crate) fn access(
        &self,
        actor: &Actor,
        tenant_id: &TenantId,
    ) -> Result<AccessLevel, EngineError> {
        Ok(resolve_access(self.deps.overrides.as_ref(), actor, tenant_id)?)
    }

    pub(crate) fn authorized(
        &self,
        actor: &Actor,
        tenant_id: &TenantId,
    ) -> Result<bool, EngineError> {
        Ok(is_authorized(self.deps.overrides.as_ref(), actor, tenant_id)?)
    }

    pub(crate) fn log(&self, level: LogLevel, event: &str, message: &str) {
        append_runtime_log_fields(&self.state_paths, level, event, message, &[]);
    }

    pub(crate) fn log_fields(
        &self,
        level: LogLevel,
        event: &str,
        message: &str,
        fields: &[(&str, &str)],
    ) {
        append_runtime_log_fields(&self.state_paths, level, event, message, fields);
    }
}
