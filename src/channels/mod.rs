pub mod discord;
pub mod transport;

pub use transport::{
    ActionChoice, Card, ChatTransport, CommandEvent, FilePayload, InboundEvent, InteractionRef,
    MessageRef, Reply, SignalAnswer, SignalEvent, Tone, TransportError,
};
