//! Room command handlers.

use std::path::Path;

use anyhow::{Context, Result};
use retro_core::api::AgentClient;
use retro_core::chat::{self, ChatError, ChatSession};
use retro_core::config::Config;
use retro_core::markdown;
use retro_core::store::{Message, RoomStore, StoreError};

use super::chat::session_options;

pub fn list(store: &RoomStore, user: &str) -> Result<()> {
    let data = store.user_data(user).context("load rooms")?;
    for name in data.rooms.names() {
        let count = data.rooms.get(name).map_or(0, <[Message]>::len);
        let marker = if name == data.last_room { "*" } else { " " };
        println!("{marker} {name}  ({count} messages)");
    }
    Ok(())
}

pub fn create(store: &RoomStore, user: &str, name: &str) -> Result<()> {
    match store.create_room(user, name) {
        Ok(Some(room)) => println!("Created room {room}"),
        Ok(None) => anyhow::bail!("Room name must not be empty"),
        // The store already switched to the existing room.
        Err(e @ StoreError::RoomExists(_)) => println!("{e} (now current)"),
        Err(e) => return Err(e).context("create room"),
    }
    Ok(())
}

pub fn enter(store: &RoomStore, user: &str, name: &str) -> Result<()> {
    match store.enter_room(user, name)? {
        Some(room) => println!("Entered room {room}"),
        None => anyhow::bail!("Room name must not be empty"),
    }
    Ok(())
}

pub async fn delete(store: RoomStore, config: &Config, user: &str, name: &str) -> Result<()> {
    let mut session = login(store, config, user)?;
    let current = session.delete_room(name).await.map_err(|e| match e {
        ChatError::Api(e) => anyhow::Error::new(e).context(format!(
            "Room {} was kept: the backend session could not be deleted",
            name.trim()
        )),
        other => other.into(),
    })?;
    println!("Deleted room {}; current room is {current}", name.trim());
    Ok(())
}

pub async fn rename(
    store: RoomStore,
    config: &Config,
    user: &str,
    from: &str,
    to: &str,
) -> Result<()> {
    let mut session = login(store, config, user)?;
    match session.rename_room(from, to).await? {
        Some(room) => println!("Renamed room {} → {room}", from.trim()),
        None => anyhow::bail!("Room name must not be empty"),
    }
    Ok(())
}

pub fn show(store: &RoomStore, user: &str, name: Option<&str>, json: bool) -> Result<()> {
    let (room, history) = room_history(store, user, name)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&history).context("serialize history")?
        );
        return Ok(());
    }

    if history.is_empty() {
        println!("No previous messages in {room}.");
        return Ok(());
    }
    for message in &history {
        println!(
            "[{}] {}: {}",
            format_timestamp(message.timestamp),
            message.role,
            message.text
        );
    }
    Ok(())
}

pub fn export(
    store: &RoomStore,
    user: &str,
    name: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let (room, history) = room_history(store, user, name)?;
    let page = markdown::render_document(&room, &chat::render_transcript(&history));

    match output {
        Some(path) => {
            std::fs::write(path, page).with_context(|| format!("write {}", path.display()))?;
            println!("Exported {room} to {}", path.display());
        }
        None => print!("{page}"),
    }
    Ok(())
}

fn login(store: RoomStore, config: &Config, user: &str) -> Result<ChatSession> {
    let client = AgentClient::from_config(config)?;
    Ok(ChatSession::login(
        store,
        client,
        user,
        session_options(config, None, None),
    )?)
}

/// Resolves `name` (default: the current room) and loads its history.
fn room_history(
    store: &RoomStore,
    user: &str,
    name: Option<&str>,
) -> Result<(String, Vec<Message>)> {
    let data = store.user_data(user).context("load rooms")?;
    let room = name.map_or_else(|| data.last_room.clone(), |n| n.trim().to_string());
    let history = data
        .rooms
        .get(&room)
        .ok_or_else(|| StoreError::RoomNotFound(room.clone()))?
        .to_vec();
    Ok((room, history))
}

fn format_timestamp(millis: i64) -> String {
    if millis <= 0 {
        return "-".to_string();
    }
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}
