//! CLI command handlers.

pub mod backend;
pub mod chat;
pub mod config;
pub mod render;
pub mod rooms;
