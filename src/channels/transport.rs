use crate::permissions::Actor;
use crate::shared::{ChannelId, ConfirmationToken, JobId, MessageId, TenantId};

const CHOICE_NAMESPACE: &str = "massban";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Prompt,
    Info,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub description: Option<String>,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionChoice {
    Confirm(ConfirmationToken),
    Cancel(ConfirmationToken),
    Stop(JobId),
    ViewProgress(JobId),
}

impl ActionChoice {
    pub fn custom_id(&self) -> String {
        match self {
            Self::Confirm(token) => format!("{CHOICE_NAMESPACE}:confirm:{token}"),
            Self::Cancel(token) => format!("{CHOICE_NAMESPACE}:cancel:{token}"),
            Self::Stop(job_id) => format!("{CHOICE_NAMESPACE}:stop:{job_id}"),
            Self::ViewProgress(job_id) => format!("{CHOICE_NAMESPACE}:view:{job_id}"),
        }
    }

    pub fn parse_custom_id(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, ':');
        if parts.next()? != CHOICE_NAMESPACE {
            return None;
        }
        let kind = parts.next()?;
        let id = parts.next()?;
        match kind {
            "confirm" => ConfirmationToken::parse(id).ok().map(Self::Confirm),
            "cancel" => ConfirmationToken::parse(id).ok().map(Self::Cancel),
            "stop" => JobId::parse(id).ok().map(Self::Stop),
            "view" => JobId::parse(id).ok().map(Self::ViewProgress),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirm(_) => "CONFIRM",
            Self::Cancel(_) => "CANCEL",
            Self::Stop(_) => "STOP",
            Self::ViewProgress(_) => "VIEW PROGRESS",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: Option<String>,
    pub card: Option<Card>,
    pub file: Option<FilePayload>,
    pub choices: Vec<ActionChoice>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn card(title: impl Into<String>, description: Option<String>, tone: Tone) -> Self {
        Self {
            card: Some(Card {
                title: title.into(),
                description,
                tone,
            }),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, content: Vec<u8>) -> Self {
        self.file = Some(FilePayload {
            name: name.into(),
            content,
        });
        self
    }

    pub fn with_choices(mut self, choices: Vec<ActionChoice>) -> Self {
        self.choices = choices;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub actor: Actor,
    pub tenant_id: TenantId,
    pub source: MessageRef,
    pub text: String,
    pub attachments: Vec<String>,
    pub bot_can_ban: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvent {
    pub actor: Actor,
    pub tenant_id: TenantId,
    pub choice: ActionChoice,
    pub interaction: InteractionRef,
    pub message: MessageRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command(CommandEvent),
    Signal(SignalEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalAnswer {
    Update(Reply),
    Ephemeral(String),
    Acknowledge,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport request failed: {0}")]
pub struct TransportError(pub String);

pub trait ChatTransport: Send + Sync {
    fn reply(&self, to: &CommandEvent, reply: &Reply) -> Result<MessageRef, TransportError>;

    fn edit(&self, message: &MessageRef, reply: &Reply) -> Result<(), TransportError>;

    fn answer(
        &self,
        interaction: &InteractionRef,
        answer: &SignalAnswer,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_round_trip_through_parse() {
        let job_id = JobId::generate();
        let stop = ActionChoice::Stop(job_id.clone());
        assert_eq!(
            ActionChoice::parse_custom_id(&stop.custom_id()),
            Some(stop)
        );
        assert_eq!(
            ActionChoice::ViewProgress(job_id.clone()).custom_id(),
            format!("massban:view:{job_id}")
        );
    }

    #[test]
    fn foreign_or_malformed_custom_ids_are_ignored() {
        assert_eq!(ActionChoice::parse_custom_id("stop"), None);
        assert_eq!(ActionChoice::parse_custom_id("other:stop:0011223344556677"), None);
        assert_eq!(ActionChoice::parse_custom_id("massban:stop:nothex"), None);
        assert_eq!(ActionChoice::parse_custom_id("massban:purge:0011223344556677"), None);
    }
}
