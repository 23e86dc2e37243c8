use super::guild_cache::{
    parse_permission_bits, GuildCache, MemberPayload, UserPayload, ADMINISTRATOR,
};
use crate::channels::{ActionChoice, CommandEvent, InteractionRef, MessageRef, SignalEvent};
use crate::permissions::Actor;
use crate::shared::{ChannelId, MessageId, TenantId};
use serde::Deserialize;

const MESSAGE_COMPONENT_INTERACTION: u8 = 3;

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentPayload {
    pub(crate) url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageCreatePayload {
    pub(crate) id: MessageId,
    pub(crate) channel_id: ChannelId,
    #[serde(default)]
    pub(crate) guild_id: Option<TenantId>,
    pub(crate) author: UserPayload,
    #[serde(default)]
    pub(crate) member: Option<MemberPayload>,
    #[serde(default)]
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) attachments: Vec<AttachmentPayload>,
    #[serde(default)]
    pub(crate) webhook_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InteractionData {
    #[serde(default)]
    pub(crate) custom_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InteractionMessage {
    pub(crate) id: MessageId,
    pub(crate) channel_id: ChannelId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InteractionPayload {
    pub(crate) id: String,
    pub(crate) token: String,
    #[serde(rename = "type")]
    pub(crate) kind: u8,
    #[serde(default)]
    pub(crate) guild_id: Option<TenantId>,
    #[serde(default)]
    pub(crate) member: Option<MemberPayload>,
    #[serde(default)]
    pub(crate) data: Option<InteractionData>,
    #[serde(default)]
    pub(crate) message: Option<InteractionMessage>,
}

pub(crate) fn command_event(
    payload: MessageCreatePayload,
    cache: &GuildCache,
) -> Option<CommandEvent> {
    if payload.author.bot || payload.webhook_id.is_some() {
        return None;
    }
    let tenant_id = payload.guild_id?;
    let role_ids = payload.member.map(|member| member.roles).unwrap_or_default();
    let is_admin = cache.is_admin(&tenant_id, &payload.author.id, &role_ids);
    let bot_can_ban = cache.bot_can_ban(&tenant_id);
    Some(CommandEvent {
        actor: Actor {
            user_id: payload.author.id,
            role_ids,
            is_admin,
        },
        tenant_id,
        source: MessageRef {
            channel_id: payload.channel_id,
            message_id: payload.id,
        },
        text: payload.content,
        attachments: payload
            .attachments
            .into_iter()
            .map(|attachment| attachment.url)
            .collect(),
        bot_can_ban,
    })
}

pub(crate) fn signal_event(payload: InteractionPayload, cache: &GuildCache) -> Option<SignalEvent> {
    if payload.kind != MESSAGE_COMPONENT_INTERACTION {
        return None;
    }
    let choice = ActionChoice::parse_custom_id(&payload.data?.custom_id)?;
    let tenant_id = payload.guild_id?;
    let member = payload.member?;
    let user_id = member.user?.id;
    let is_admin = match member.permissions.as_deref() {
        Some(bits) => parse_permission_bits(bits) & ADMINISTRATOR != 0,
        None => cache.is_admin(&tenant_id, &user_id, &member.roles),
    };
    let message = payload.message?;
    Some(SignalEvent {
        actor: Actor {
            user_id,
            role_ids: member.roles,
            is_admin,
        },
        tenant_id,
        choice,
        interaction: InteractionRef {
            id: payload.id,
            token: payload.token,
        },
        message: MessageRef {
            channel_id: message.channel_id,
            message_id: message.id,
        },
    })
}
