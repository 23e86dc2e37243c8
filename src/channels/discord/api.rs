use super::DiscordError;
use crate::channels::{
    ActionChoice, Card, ChatTransport, CommandEvent, FilePayload, InteractionRef, MessageRef,
    Reply, SignalAnswer, Tone, TransportError,
};
use crate::massban::{BanAction, BanActionError, BanFailureCause, BanParams};
use crate::shared::ids::random_hex_token;
use crate::shared::{ChannelId, MessageId, TenantId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

const USER_AGENT: &str = "DiscordBot (https://github.com/banhammer, 0.1)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RATE_LIMIT_RETRIES: usize = 3;
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(10);
const ERROR_BODY_CHARS: usize = 300;
const EPHEMERAL_FLAG: u64 = 1 << 6;

const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
const CALLBACK_DEFERRED_UPDATE: u8 = 6;
const CALLBACK_UPDATE_MESSAGE: u8 = 7;

#[derive(Debug, Deserialize)]
struct GatewayBotData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: MessageId,
    channel_id: ChannelId,
}

enum Body {
    Empty,
    Json(Value),
    Multipart { content_type: String, bytes: Vec<u8> },
}

impl Body {
    fn for_payload(payload: Value, file: Option<&FilePayload>) -> Self {
        match file {
            Some(file) => {
                let (content_type, bytes) = multipart_body(&payload, file);
                Self::Multipart {
                    content_type,
                    bytes,
                }
            }
            None => Self::Json(payload),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscordClient {
    api_base: String,
    token: String,
    agent: ureq::Agent,
}

impl DiscordClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            token: token.into(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    fn send(
        &self,
        method: &str,
        path: &str,
        body: &Body,
        audit_reason: Option<&str>,
    ) -> Result<ureq::Response, DiscordError> {
        let url = self.endpoint(path);
        let mut retries = 0;
        loop {
            let mut request = self
                .agent
                .request(method, &url)
                .set("Authorization", &format!("Bot {}", self.token))
                .set("User-Agent", USER_AGENT);
            if let Some(reason) = audit_reason {
                request = request.set("X-Audit-Log-Reason", &urlencoding::encode(reason));
            }
            let result = match body {
                Body::Empty => request.call(),
                Body::Json(value) => request.send_json(value.clone()),
                Body::Multipart {
                    content_type,
                    bytes,
                } => request.set("Content-Type", content_type).send_bytes(bytes),
            };
            match result {
                Ok(response) => return Ok(response),
                Err(ureq::Error::Status(429, response)) if retries < MAX_RATE_LIMIT_RETRIES => {
                    retries += 1;
                    thread::sleep(retry_after(response.header("Retry-After")));
                }
                Err(ureq::Error::Status(status, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    return Err(DiscordError::ApiStatus {
                        status,
                        body: body.chars().take(ERROR_BODY_CHARS).collect(),
                    });
                }
                Err(err) => return Err(DiscordError::ApiRequest(err.to_string())),
            }
        }
    }

    fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        path: &str,
        body: &Body,
    ) -> Result<T, DiscordError> {
        self.send(method, path, body, None)?
            .into_json::<T>()
            .map_err(|err| DiscordError::ApiRequest(format!("{method} {path}: {err}")))
    }

    pub fn gateway_url(&self) -> Result<String, DiscordError> {
        let data: GatewayBotData = self.send_json("GET", "gateway/bot", &Body::Empty)?;
        Ok(data.url)
    }

    pub fn create_message(
        &self,
        channel_id: &ChannelId,
        reply: &Reply,
        reference: Option<&MessageId>,
    ) -> Result<MessageRef, DiscordError> {
        let mut payload = message_payload(reply);
        if let Some(reference) = reference {
            payload["message_reference"] = json!({
                "message_id": reference.as_str(),
                "fail_if_not_exists": false,
            });
        }
        let created: CreatedMessage = self.send_json(
            "POST",
            &format!("channels/{channel_id}/messages"),
            &Body::for_payload(payload, reply.file.as_ref()),
        )?;
        Ok(MessageRef {
            channel_id: created.channel_id,
            message_id: created.id,
        })
    }

    pub fn edit_message(&self, message: &MessageRef, reply: &Reply) -> Result<(), DiscordError> {
        self.send(
            "PATCH",
            &format!(
                "channels/{}/messages/{}",
                message.channel_id, message.message_id
            ),
            &Body::for_payload(message_payload(reply), reply.file.as_ref()),
            None,
        )?;
        Ok(())
    }

    pub fn interaction_callback(
        &self,
        interaction: &InteractionRef,
        answer: &SignalAnswer,
    ) -> Result<(), DiscordError> {
        let (payload, file) = match answer {
            SignalAnswer::Update(reply) => (
                json!({ "type": CALLBACK_UPDATE_MESSAGE, "data": message_payload(reply) }),
                reply.file.as_ref(),
            ),
            SignalAnswer::Ephemeral(text) => (
                json!({
                    "type": CALLBACK_CHANNEL_MESSAGE,
                    "data": { "content": text, "flags": EPHEMERAL_FLAG },
                }),
                None,
            ),
            SignalAnswer::Acknowledge => (json!({ "type": CALLBACK_DEFERRED_UPDATE }), None),
        };
        self.send(
            "POST",
            &format!(
                "interactions/{}/{}/callback",
                interaction.id, interaction.token
            ),
            &Body::for_payload(payload, file),
            None,
        )?;
        Ok(())
    }

    pub fn ban_member(
        &self,
        tenant_id: &TenantId,
        user_id: &str,
        params: &BanParams,
    ) -> Result<(), DiscordError> {
        self.send(
            "PUT",
            &format!("guilds/{tenant_id}/bans/{user_id}"),
            &Body::Json(json!({ "delete_message_seconds": params.delete_message_seconds() })),
            params.reason.as_deref(),
        )?;
        Ok(())
    }
}

impl ChatTransport for DiscordClient {
    fn reply(&self, to: &CommandEvent, reply: &Reply) -> Result<MessageRef, TransportError> {
        self.create_message(&to.source.channel_id, reply, Some(&to.source.message_id))
            .map_err(|err| TransportError(err.to_string()))
    }

    fn edit(&self, message: &MessageRef, reply: &Reply) -> Result<(), TransportError> {
        self.edit_message(message, reply)
            .map_err(|err| TransportError(err.to_string()))
    }

    fn answer(
        &self,
        interaction: &InteractionRef,
        answer: &SignalAnswer,
    ) -> Result<(), TransportError> {
        self.interaction_callback(interaction, answer)
            .map_err(|err| TransportError(err.to_string()))
    }
}

impl BanAction for DiscordClient {
    fn ban(
        &self,
        tenant_id: &TenantId,
        candidate_id: &str,
        params: &BanParams,
    ) -> Result<(), BanActionError> {
        self.ban_member(tenant_id, candidate_id, params)
            .map_err(|err| match err {
                DiscordError::ApiStatus { status, body } => {
                    BanActionError::new(BanFailureCause::from_status(status), body)
                }
                other => BanActionError::new(BanFailureCause::Other, other.to_string()),
            })
    }
}

fn retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_secs(1))
        .min(MAX_RATE_LIMIT_WAIT)
}

fn tone_color(tone: Tone) -> u32 {
    match tone {
        Tone::Prompt => 0xf1c40f,
        Tone::Info => 0x3498db,
        Tone::Success => 0x2ecc71,
        Tone::Danger => 0xe74c3c,
    }
}

fn button_style(choice: &ActionChoice) -> u8 {
    match choice {
        ActionChoice::Confirm(_) => 3,
        ActionChoice::Cancel(_) | ActionChoice::Stop(_) => 4,
        ActionChoice::ViewProgress(_) => 2,
    }
}

fn embed(card: &Card) -> Value {
    let mut embed = json!({ "title": card.title, "color": tone_color(card.tone) });
    if let Some(description) = &card.description {
        embed["description"] = json!(description);
    }
    embed
}

fn attachment_list(file: Option<&FilePayload>) -> Value {
    match file {
        Some(file) => json!([{ "id": 0, "filename": file.name }]),
        None => json!([]),
    }
}

pub(crate) fn message_payload(reply: &Reply) -> Value {
    let components = if reply.choices.is_empty() {
        Vec::new()
    } else {
        let buttons: Vec<Value> = reply
            .choices
            .iter()
            .map(|choice| {
                json!({
                    "type": 2,
                    "style": button_style(choice),
                    "label": choice.label(),
                    "custom_id": choice.custom_id(),
                })
            })
            .collect();
        vec![json!({ "type": 1, "components": buttons })]
    };
    json!({
        "content": reply.text.clone().unwrap_or_default(),
        "embeds": reply.card.iter().map(embed).collect::<Vec<_>>(),
        "components": components,
        "allowed_mentions": { "parse": [] },
        "attachments": attachment_list(reply.file.as_ref()),
    })
}

pub(crate) fn multipart_body(payload: &Value, file: &FilePayload) -> (String, Vec<u8>) {
    let boundary = format!("banhammer-{}", random_hex_token());
    let mut body = Vec::with_capacity(file.content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"payload_json\"\r\nContent-Type: application/json\r\n\r\n{payload}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"files[0]\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
            file.name
        )
        .as_bytes(),
    );
    body.extend_from_slice(&file.content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
