//! Core Retro library (markdown rendering, room store, agent backend client, chat session).

pub mod api;
pub mod chat;
pub mod config;
pub mod interrupt;
pub mod logging;
pub mod markdown;
pub mod store;
