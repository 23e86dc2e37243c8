pub mod chat_commands;
pub mod cli;
pub mod command_handlers;
pub mod command_support;
pub mod engine;
pub mod render;

pub use command_handlers::massban::{run_massban, MassbanOutcome};
pub use engine::{Engine, EngineConfig, EngineDeps, EngineError};
