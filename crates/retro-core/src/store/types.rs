//! Persisted shapes for the room store.
//!
//! Field names match the blob written by the browser client (`users`,
//! `lastRoom`, `rooms`, `role`, `text`, `timestamp`), so an existing blob
//! loads unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Room every user starts in, and falls back to when they delete the last one.
pub const DEFAULT_ROOM: &str = "General Chat";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    fn parse_lenient(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            _ => Role::System,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a room's history. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Best-effort decoding of a stored history entry.
    ///
    /// Bare strings are legacy system lines. Objects with an unknown role load
    /// as system messages. Anything else is skipped.
    fn from_stored(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self {
                role: Role::System,
                text: text.clone(),
                timestamp: 0,
            }),
            Value::Object(fields) => {
                let text = match fields.get("text") {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                Some(Self {
                    role: Role::parse_lenient(fields.get("role")),
                    text,
                    timestamp: fields.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
                })
            }
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_stored(&value)
            .ok_or_else(|| serde::de::Error::custom("message must be a string or an object"))
    }
}

/// A user's rooms, in creation order.
///
/// Serialized as a JSON object keyed by room name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rooms(Vec<(String, Vec<Message>)>);

impl Rooms {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&[Message]> {
        self.position(name).map(|idx| self.0[idx].1.as_slice())
    }

    /// Room names in creation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn first_name(&self) -> Option<&str> {
        self.0.first().map(|(name, _)| name.as_str())
    }

    /// Returns the room's history, creating an empty room at the end if needed.
    pub fn entry(&mut self, name: &str) -> &mut Vec<Message> {
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => {
                self.0.push((name.to_string(), Vec::new()));
                self.0.len() - 1
            }
        };
        &mut self.0[idx].1
    }

    /// Adds an empty room. Returns false if it already exists.
    pub fn insert_empty(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.0.push((name.to_string(), Vec::new()));
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Message>> {
        self.position(name).map(|idx| self.0.remove(idx).1)
    }

    /// Renames a room in place, keeping its position.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if self.contains(to) {
            return false;
        }
        match self.position(from) {
            Some(idx) => {
                self.0[idx].0 = to.to_string();
                true
            }
            None => false,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(room, _)| room == name)
    }
}

impl Serialize for Rooms {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, messages) in &self.0 {
            map.serialize_entry(name, messages)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Rooms {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's `preserve_order` keeps the object in document order.
        let object = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let rooms = object
            .into_iter()
            .map(|(name, history)| {
                let messages = match history {
                    Value::Array(entries) => {
                        entries.iter().filter_map(Message::from_stored).collect()
                    }
                    _ => Vec::new(),
                };
                (name, messages)
            })
            .collect();
        Ok(Self(rooms))
    }
}

/// Everything stored for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(rename = "lastRoom", default)]
    pub last_room: String,
    #[serde(default)]
    pub rooms: Rooms,
}

impl Default for UserData {
    fn default() -> Self {
        let mut rooms = Rooms::default();
        rooms.insert_empty(DEFAULT_ROOM);
        Self {
            last_room: DEFAULT_ROOM.to_string(),
            rooms,
        }
    }
}

impl UserData {
    /// Points `last_room` at an existing room if it currently isn't one.
    pub(crate) fn repair_last_room(&mut self) {
        if self.rooms.is_empty() {
            self.rooms.insert_empty(DEFAULT_ROOM);
        }
        if !self.rooms.contains(&self.last_room)
            && let Some(first) = self.rooms.first_name()
        {
            self.last_room = first.to_string();
        }
    }
}

/// The whole persisted blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub users: BTreeMap<String, UserData>,
}

/// Correlates a local room with conversation state on the agent backend.
///
/// Derived as `user::room`; renaming or deleting a room changes or retires it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(user: &str, room: &str) -> Self {
        Self(format!("{user}::{room}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
