pub mod api;
pub mod events;
pub mod gateway;
pub mod guild_cache;

pub use api::DiscordClient;
pub use gateway::{run_gateway, GatewayOptions, GATEWAY_INTENTS};
pub use guild_cache::{GuildCache, ADMINISTRATOR, BAN_MEMBERS};

#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("discord api request failed: {0}")]
    ApiRequest(String),
    #[error("discord api responded with status {status}: {body}")]
    ApiStatus { status: u16, body: String },
    #[error("discord rejected the bot token")]
    Unauthorized,
    #[error("discord gateway closed the session with code {code}")]
    GatewayClosed { code: u16 },
    #[error("failed to configure gateway socket: {0}")]
    Socket(#[source] std::io::Error),
}
