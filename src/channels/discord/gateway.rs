use super::events::{command_event, signal_event, InteractionPayload, MessageCreatePayload};
use super::guild_cache::{
    GuildCache, GuildDeletePayload, GuildPayload, MemberUpdatePayload, RoleDeletePayload,
    RoleUpsertPayload, UserPayload,
};
use super::{DiscordClient, DiscordError};
use crate::app::Engine;
use crate::channels::InboundEvent;
use crate::shared::{append_runtime_log, append_runtime_log_fields, LogLevel, StatePaths};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_GUILD_MESSAGES: u64 = 1 << 9;
pub const INTENT_MESSAGE_CONTENT: u64 = 1 << 15;
pub const GATEWAY_INTENTS: u64 = INTENT_GUILDS | INTENT_GUILD_MESSAGES | INTENT_MESSAGE_CONTENT;

const GATEWAY_QUERY: &str = "v=10&encoding=json";
const SOCKET_IDLE_SLEEP: Duration = Duration::from_millis(40);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RESUME: u8 = 6;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub token: String,
    pub reconnect_backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
struct ReadyData {
    session_id: String,
    #[serde(default)]
    resume_gateway_url: Option<String>,
    user: UserPayload,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Effect {
    Send(Value),
    Dispatch(InboundEvent),
    Reconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionOutcome {
    Stop,
    Reconnect,
    Fatal(u16),
}

pub(crate) fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010 | 4011 | 4012 | 4013 | 4014)
}

pub(crate) fn with_query(url: &str) -> String {
    if url.contains('?') {
        return url.to_string();
    }
    format!("{}/?{GATEWAY_QUERY}", url.trim_end_matches('/'))
}

fn decode<T: DeserializeOwned>(data: Value) -> Option<T> {
    serde_json::from_value(data).ok()
}

#[derive(Debug)]
struct Heartbeat {
    interval: Duration,
    next_due: Instant,
    acked: bool,
}

fn first_beat_delay(interval: Duration) -> Duration {
    let millis = interval.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(seed % millis)
}

pub(crate) struct GatewaySession {
    token: String,
    paths: StatePaths,
    cache: GuildCache,
    session_id: Option<String>,
    resume_url: Option<String>,
    sequence: Option<u64>,
    heartbeat: Option<Heartbeat>,
}

impl GatewaySession {
    pub(crate) fn new(token: String, paths: StatePaths) -> Self {
        Self {
            token,
            paths,
            cache: GuildCache::default(),
            session_id: None,
            resume_url: None,
            sequence: None,
            heartbeat: None,
        }
    }

    pub(crate) fn cache(&self) -> &GuildCache {
        &self.cache
    }

    pub(crate) fn resume_url(&self) -> Option<&str> {
        if self.session_id.is_none() || self.sequence.is_none() {
            return None;
        }
        self.resume_url.as_deref()
    }

    pub(crate) fn begin_connection(&mut self) {
        self.heartbeat = None;
    }

    fn forget_session(&mut self) {
        self.session_id = None;
        self.resume_url = None;
        self.sequence = None;
    }

    fn identify_payload(&self) -> Value {
        json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "banhammer",
                    "device": "banhammer",
                },
            },
        })
    }

    fn handshake_payload(&self) -> Value {
        match (&self.session_id, self.sequence) {
            (Some(session_id), Some(sequence)) => json!({
                "op": OP_RESUME,
                "d": { "token": self.token, "session_id": session_id, "seq": sequence },
            }),
            _ => self.identify_payload(),
        }
    }

    fn heartbeat_payload(&self) -> Value {
        json!({ "op": OP_HEARTBEAT, "d": self.sequence })
    }

    pub(crate) fn tick(&mut self, now: Instant) -> Option<Effect> {
        let payload = self.heartbeat_payload();
        let heartbeat = self.heartbeat.as_mut()?;
        if now < heartbeat.next_due {
            return None;
        }
        if !heartbeat.acked {
            return Some(Effect::Reconnect);
        }
        heartbeat.acked = false;
        heartbeat.next_due = now + heartbeat.interval;
        Some(Effect::Send(payload))
    }

    pub(crate) fn on_text(&mut self, text: &str, now: Instant) -> Vec<Effect> {
        let Ok(frame) = serde_json::from_str::<GatewayFrame>(text) else {
            return Vec::new();
        };
        if let Some(sequence) = frame.s {
            self.sequence = Some(sequence);
        }
        match frame.op {
            OP_HELLO => {
                let Some(hello) = decode::<HelloData>(frame.d) else {
                    return vec![Effect::Reconnect];
                };
                let interval = Duration::from_millis(hello.heartbeat_interval.max(1));
                self.heartbeat = Some(Heartbeat {
                    interval,
                    next_due: now + first_beat_delay(interval),
                    acked: true,
                });
                vec![Effect::Send(self.handshake_payload())]
            }
            OP_HEARTBEAT => vec![Effect::Send(self.heartbeat_payload())],
            OP_HEARTBEAT_ACK => {
                if let Some(heartbeat) = self.heartbeat.as_mut() {
                    heartbeat.acked = true;
                }
                Vec::new()
            }
            OP_RECONNECT => vec![Effect::Reconnect],
            OP_INVALID_SESSION => {
                if !frame.d.as_bool().unwrap_or(false) {
                    self.forget_session();
                }
                vec![Effect::Reconnect]
            }
            OP_DISPATCH => self
                .on_dispatch(frame.t.as_deref().unwrap_or_default(), frame.d)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }

    fn on_dispatch(&mut self, kind: &str, data: Value) -> Option<Effect> {
        match kind {
            "READY" => {
                let ready = decode::<ReadyData>(data)?;
                append_runtime_log_fields(
                    &self.paths,
                    LogLevel::Info,
                    "gateway.ready",
                    "session established",
                    &[("bot_user_id", ready.user.id.as_str())],
                );
                self.session_id = Some(ready.session_id);
                self.resume_url = ready.resume_gateway_url;
                self.cache.set_bot_user(ready.user.id);
                None
            }
            "RESUMED" => {
                append_runtime_log_fields(
                    &self.paths,
                    LogLevel::Info,
                    "gateway.resumed",
                    "session resumed",
                    &[],
                );
                None
            }
            "GUILD_CREATE" | "GUILD_UPDATE" => {
                self.cache.apply_guild(decode::<GuildPayload>(data)?);
                None
            }
            "GUILD_DELETE" => {
                self.cache.remove_guild(decode::<GuildDeletePayload>(data)?);
                None
            }
            "GUILD_ROLE_CREATE" | "GUILD_ROLE_UPDATE" => {
                self.cache.upsert_role(decode::<RoleUpsertPayload>(data)?);
                None
            }
            "GUILD_ROLE_DELETE" => {
                self.cache.remove_role(decode::<RoleDeletePayload>(data)?);
                None
            }
            "GUILD_MEMBER_UPDATE" => {
                self.cache.update_member(decode::<MemberUpdatePayload>(data)?);
                None
            }
            "MESSAGE_CREATE" => {
                let payload = decode::<MessageCreatePayload>(data)?;
                command_event(payload, &self.cache)
                    .map(|event| Effect::Dispatch(InboundEvent::Command(event)))
            }
            "INTERACTION_CREATE" => {
                let payload = decode::<InteractionPayload>(data)?;
                signal_event(payload, &self.cache)
                    .map(|event| Effect::Dispatch(InboundEvent::Signal(event)))
            }
            _ => None,
        }
    }
}

pub fn run_gateway(
    client: &DiscordClient,
    engine: &Arc<Engine>,
    paths: &StatePaths,
    options: &GatewayOptions,
    stop: &AtomicBool,
) -> Result<(), DiscordError> {
    let mut session = GatewaySession::new(options.token.clone(), paths.clone());
    let backoff = options.reconnect_backoff.max(Duration::from_millis(1));

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let url = match session.resume_url() {
            Some(url) => url.to_string(),
            None => match client.gateway_url() {
                Ok(url) => url,
                Err(DiscordError::ApiStatus { status: 401, .. }) => {
                    return Err(DiscordError::Unauthorized)
                }
                Err(err) => {
                    append_runtime_log(
                        paths,
                        LogLevel::Warn,
                        "gateway.url_failed",
                        &err.to_string(),
                    );
                    if !sleep_reconnect(backoff, stop) {
                        break;
                    }
                    continue;
                }
            },
        };

        let (mut socket, _) = match connect(with_query(&url).as_str()) {
            Ok(connection) => connection,
            Err(err) => {
                append_runtime_log(
                    paths,
                    LogLevel::Warn,
                    "gateway.connect_failed",
                    &err.to_string(),
                );
                if !sleep_reconnect(backoff, stop) {
                    break;
                }
                continue;
            }
        };
        set_socket_nonblocking(&mut socket)?;
        append_runtime_log(paths, LogLevel::Info, "gateway.connected", &url);

        session.begin_connection();
        let outcome = process_connection(&mut socket, &mut session, engine, paths, stop);
        let _ = socket.close(None);
        let _ = socket.flush();

        match outcome {
            ConnectionOutcome::Stop => break,
            ConnectionOutcome::Fatal(code) => {
                append_runtime_log(
                    paths,
                    LogLevel::Error,
                    "gateway.closed",
                    &format!("code={code}"),
                );
                if code == 4004 {
                    return Err(DiscordError::Unauthorized);
                }
                return Err(DiscordError::GatewayClosed { code });
            }
            ConnectionOutcome::Reconnect => {
                append_runtime_log(paths, LogLevel::Warn, "gateway.disconnected", "reconnecting");
                if !sleep_reconnect(backoff, stop) {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn process_connection(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    session: &mut GatewaySession,
    engine: &Arc<Engine>,
    paths: &StatePaths,
    stop: &AtomicBool,
) -> ConnectionOutcome {
    loop {
        if stop.load(Ordering::Relaxed) {
            return ConnectionOutcome::Stop;
        }

        let mut effects: Vec<Effect> = session.tick(Instant::now()).into_iter().collect();
        let mut idle = false;
        match socket.read() {
            Ok(Message::Text(text)) => effects.extend(session.on_text(&text, Instant::now())),
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let code = frame.map(|frame| u16::from(frame.code)).unwrap_or(1000);
                if is_fatal_close(code) {
                    return ConnectionOutcome::Fatal(code);
                }
                return ConnectionOutcome::Reconnect;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                idle = true;
            }
            Err(err) => {
                append_runtime_log(paths, LogLevel::Warn, "gateway.read_failed", &err.to_string());
                return ConnectionOutcome::Reconnect;
            }
        }

        for effect in effects {
            match effect {
                Effect::Send(payload) => {
                    if let Err(err) = socket.send(Message::Text(payload.to_string())) {
                        if !is_would_block(&err) {
                            append_runtime_log(
                                paths,
                                LogLevel::Warn,
                                "gateway.send_failed",
                                &err.to_string(),
                            );
                            return ConnectionOutcome::Reconnect;
                        }
                    }
                }
                Effect::Dispatch(event) => dispatch(engine, paths, event),
                Effect::Reconnect => return ConnectionOutcome::Reconnect,
            }
        }

        if idle {
            thread::sleep(SOCKET_IDLE_SLEEP);
        }
    }
}

fn is_would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(io) if io.kind() == ErrorKind::WouldBlock)
}

fn dispatch(engine: &Arc<Engine>, paths: &StatePaths, event: InboundEvent) {
    let handled = panic::catch_unwind(AssertUnwindSafe(|| engine.handle_event(event)));
    if handled.is_err() {
        append_runtime_log(paths, LogLevel::Error, "handler.panic", "event handler panicked");
    }
}

fn sleep_reconnect(backoff: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = backoff;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(25));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

fn set_socket_nonblocking(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
) -> Result<(), DiscordError> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_nonblocking(true),
        _ => Ok(()),
    }
    .map_err(DiscordError::Socket)
}
