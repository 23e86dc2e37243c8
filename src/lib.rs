pub mod app;
pub mod channels;
pub mod config;
pub mod massban;
pub mod permissions;
pub mod shared;
