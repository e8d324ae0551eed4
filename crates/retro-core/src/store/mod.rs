//! Per-user chat rooms persisted as a single JSON blob.
//!
//! The whole store lives under one key of a [`BlobStore`]:
//!
//! ```json
//! { "users": { "ada": { "lastRoom": "General Chat",
//!                       "rooms": { "General Chat": [ { "role": "user", "text": "hi", "timestamp": 1718000000000 } ] } } } }
//! ```
//!
//! Every mutation is a read-modify-write of the whole blob with no locking:
//! two writers interleaving (two terminals on the same data dir) will lose
//! each other's changes, last write wins. Run one client per data dir.

mod blob;
mod types;

use std::fmt;

use anyhow::Context;
use tracing::{debug, warn};

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use types::{DEFAULT_ROOM, Message, Role, Rooms, SessionId, Store, UserData};

/// Key the store blob is kept under.
pub const STORAGE_KEY: &str = "retro_chatrooms_v1";

/// Errors reported by room operations.
///
/// `RoomExists` and `RoomNotFound` are meant to be shown to the user, not
/// treated as failures of the program.
#[derive(Debug)]
pub enum StoreError {
    RoomExists(String),
    RoomNotFound(String),
    /// Writing the blob failed.
    Persistence(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::RoomExists(name) => write!(f, "Room already exists: {name}"),
            StoreError::RoomNotFound(name) => {
                write!(f, "Room does not exist for this user: {name}")
            }
            StoreError::Persistence(e) => write!(f, "Failed to save rooms: {e:#}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Persistence(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Persistence(e)
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Rooms and message history for every user of one data dir.
pub struct RoomStore {
    blob: Box<dyn BlobStore + Send + Sync>,
    key: String,
}

impl fmt::Debug for RoomStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomStore").field("key", &self.key).finish_non_exhaustive()
    }
}

impl RoomStore {
    pub fn new(blob: impl BlobStore + Send + Sync + 'static) -> Self {
        Self {
            blob: Box::new(blob),
            key: STORAGE_KEY.to_string(),
        }
    }

    /// Store kept only in memory for the life of the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryBlobStore::new())
    }

    /// Reads the whole store.
    ///
    /// Never fails: an unreadable or structurally invalid blob yields an empty
    /// store. A user entry that doesn't decode is dropped on its own.
    pub fn load(&self) -> Store {
        let raw = match self.blob.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Store::default(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "room store unreadable, starting empty");
                return Store::default();
            }
        };

        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "room store is not valid JSON, starting empty");
                return Store::default();
            }
        };

        let Some(users) = parsed.get("users").and_then(serde_json::Value::as_object) else {
            warn!("room store has no users object, starting empty");
            return Store::default();
        };

        let mut store = Store::default();
        for (user, entry) in users {
            match serde_json::from_value::<UserData>(entry.clone()) {
                Ok(data) => {
                    store.users.insert(user.clone(), data);
                }
                Err(e) => warn!(user = %user, error = %e, "dropping undecodable user entry"),
            }
        }
        store
    }

    fn save(&self, store: &Store) -> anyhow::Result<()> {
        let json = serde_json::to_string(store).context("Failed to serialize room store")?;
        self.blob.set(&self.key, &json)
    }

    /// Returns the user's data, creating the default room first if the user
    /// has none. A last room that names no room is repointed and saved.
    pub fn user_data(&self, user: &str) -> StoreResult<UserData> {
        let mut store = self.load();
        let data = match store.users.get(user) {
            Some(existing) if existing.rooms.contains(&existing.last_room) => {
                return Ok(existing.clone());
            }
            Some(existing) if !existing.rooms.is_empty() => {
                debug!(user, room = %existing.last_room, "repairing stale last room");
                let mut repaired = existing.clone();
                repaired.repair_last_room();
                repaired
            }
            _ => {
                debug!(user, "creating default room");
                UserData::default()
            }
        };

        store.users.insert(user.to_string(), data.clone());
        self.save(&store)?;
        Ok(data)
    }

    /// Replaces the user's data. Other users in the blob are left as read.
    pub fn save_user_data(&self, user: &str, data: &UserData) -> StoreResult<()> {
        let mut store = self.load();
        store.users.insert(user.to_string(), data.clone());
        self.save(&store)?;
        Ok(())
    }

    /// Room names in creation order.
    pub fn rooms(&self, user: &str) -> StoreResult<Vec<String>> {
        let data = self.user_data(user)?;
        Ok(data.rooms.names().map(str::to_string).collect())
    }

    /// History of a room; empty for a room that doesn't exist.
    pub fn history(&self, user: &str, room: &str) -> StoreResult<Vec<Message>> {
        let data = self.user_data(user)?;
        Ok(data.rooms.get(room).map(<[Message]>::to_vec).unwrap_or_default())
    }

    /// Appends to a room (creating it if absent) and makes it the last room.
    pub fn append_message(&self, user: &str, room: &str, message: Message) -> StoreResult<()> {
        let mut data = self.user_data(user)?;
        data.rooms.entry(room).push(message);
        data.last_room = room.to_string();
        self.save_user_data(user, &data)
    }

    /// Creates an empty room and switches to it.
    ///
    /// Returns `Ok(None)` for a blank name. If the room already exists, the
    /// user is switched into it and `RoomExists` is returned; its history is
    /// untouched.
    pub fn create_room(&self, user: &str, name: &str) -> StoreResult<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut data = self.user_data(user)?;
        if !data.rooms.insert_empty(name) {
            data.last_room = name.to_string();
            self.save_user_data(user, &data)?;
            return Err(StoreError::RoomExists(name.to_string()));
        }

        data.last_room = name.to_string();
        self.save_user_data(user, &data)?;
        Ok(Some(name.to_string()))
    }

    /// Switches to an existing room. Returns `Ok(None)` for a blank name.
    pub fn enter_room(&self, user: &str, name: &str) -> StoreResult<Option<String>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut data = self.user_data(user)?;
        if !data.rooms.contains(name) {
            return Err(StoreError::RoomNotFound(name.to_string()));
        }

        data.last_room = name.to_string();
        self.save_user_data(user, &data)?;
        Ok(Some(name.to_string()))
    }

    /// Deletes a room and its history. Not recoverable.
    ///
    /// Deleting the last room recreates the default one. If the current room
    /// is gone afterwards, the first remaining room becomes current. Callers
    /// that mirror rooms on the backend must retire the remote session first
    /// and skip this call if that fails.
    pub fn delete_room(&self, user: &str, name: &str) -> StoreResult<UserData> {
        let name = name.trim();
        let mut data = self.user_data(user)?;
        if data.rooms.remove(name).is_none() {
            return Err(StoreError::RoomNotFound(name.to_string()));
        }

        data.repair_last_room();
        self.save_user_data(user, &data)?;
        Ok(data)
    }

    /// Renames a room, keeping its history and position.
    ///
    /// Returns `Ok(None)` for a blank target. The last room follows the rename.
    pub fn rename_room(&self, user: &str, from: &str, to: &str) -> StoreResult<Option<String>> {
        let (from, to) = (from.trim(), to.trim());
        if to.is_empty() {
            return Ok(None);
        }

        let mut data = self.user_data(user)?;
        if !data.rooms.contains(from) {
            return Err(StoreError::RoomNotFound(from.to_string()));
        }
        if !data.rooms.rename(from, to) {
            return Err(StoreError::RoomExists(to.to_string()));
        }

        if data.last_room == from {
            data.last_room = to.to_string();
        }
        self.save_user_data(user, &data)?;
        Ok(Some(to.to_string()))
    }
}
