//! A logged-in chat session.
//!
//! `ChatSession` owns everything the chat loop needs (user, current room,
//! agent selection, model, save bucket) together with the room store and the
//! backend client. The room store is the source of truth for which room is
//! current; the session mirrors it after every switch.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{AgentClient, ApiError, ChatRequest, default_agents};
use crate::markdown;
use crate::store::{Message, RoomStore, SessionId, StoreError};

/// Failure of a session operation.
#[derive(Debug)]
pub enum ChatError {
    Store(StoreError),
    Api(ApiError),
    /// Login with a blank user name.
    EmptyUser,
}

impl ChatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatError::Api(e) if e.is_cancelled())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Store(e) => write!(f, "{e}"),
            ChatError::Api(e) => write!(f, "{e}"),
            ChatError::EmptyUser => write!(f, "User name must not be empty"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChatError::Store(e) => Some(e),
            ChatError::Api(e) => Some(e),
            ChatError::EmptyUser => None,
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        ChatError::Store(e)
    }
}

impl From<ApiError> for ChatError {
    fn from(e: ApiError) -> Self {
        ChatError::Api(e)
    }
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

/// Per-session choices that don't come from the store.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub default_agent: String,
    pub model: String,
    pub save_to: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_agent: crate::api::DEFAULT_AGENTS[0].to_string(),
            model: "gpt-4o-mini".to_string(),
            save_to: None,
        }
    }
}

#[derive(Debug)]
pub struct ChatSession {
    user: String,
    room: String,
    agents: Vec<String>,
    active_agent: String,
    model: String,
    save_to: Option<String>,
    store: RoomStore,
    client: AgentClient,
}

impl ChatSession {
    /// Logs `user` in, resuming their last room (created on first login).
    pub fn login(
        store: RoomStore,
        client: AgentClient,
        user: &str,
        options: SessionOptions,
    ) -> ChatResult<Self> {
        let user = user.trim();
        if user.is_empty() {
            return Err(ChatError::EmptyUser);
        }

        let data = store.user_data(user)?;
        info!(user, room = %data.last_room, "logged in");

        let active_agent = if options.default_agent.trim().is_empty() {
            SessionOptions::default().default_agent
        } else {
            options.default_agent.trim().to_string()
        };

        Ok(Self {
            user: user.to_string(),
            room: data.last_room,
            agents: vec![active_agent.clone()],
            active_agent,
            model: options.model,
            save_to: options.save_to.filter(|bucket| !bucket.trim().is_empty()),
            store,
            client,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn active_agent(&self) -> &str {
        &self.active_agent
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn save_to(&self) -> Option<&str> {
        self.save_to.as_deref()
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::new(&self.user, &self.room)
    }

    /// Reloads the agent list from the backend.
    ///
    /// On failure the current list is kept. If the active agent is no longer
    /// offered, the first one becomes active.
    pub async fn refresh_agents(&mut self) -> ChatResult<&[String]> {
        let agents = match self.client.agents().await {
            Ok(agents) if !agents.is_empty() => agents,
            Ok(_) => default_agents(),
            Err(e) => {
                warn!(error = %e, "failed to load agents");
                return Err(e.into());
            }
        };

        if !agents.contains(&self.active_agent) {
            self.active_agent.clone_from(&agents[0]);
        }
        self.agents = agents;
        Ok(&self.agents)
    }

    /// Selects the agent that answers the next message. Returns false if
    /// the agent isn't offered.
    pub fn set_agent(&mut self, agent: &str) -> bool {
        match self.agents.iter().find(|a| a.as_str() == agent.trim()) {
            Some(found) => {
                self.active_agent = found.clone();
                true
            }
            None => false,
        }
    }

    pub fn set_model(&mut self, model: &str) {
        let model = model.trim();
        if !model.is_empty() {
            self.model = model.to_string();
        }
    }

    /// Sends a message in the current room.
    ///
    /// The user line is persisted before the request. If the request fails
    /// or is cancelled it stays, and nothing else is written. On success each
    /// agent reply is appended and returned. Blank messages are ignored.
    pub async fn send(
        &mut self,
        message: &str,
        cancel: Option<&CancellationToken>,
    ) -> ChatResult<Vec<Message>> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(Vec::new());
        }

        let room = self.room.clone();
        self.store.append_message(
            &self.user,
            &room,
            Message::user(format!("{}: {message}", self.user)),
        )?;

        let request = ChatRequest {
            message: message.to_string(),
            active_agent: self.active_agent.clone(),
            enabled_agents: vec![self.active_agent.clone()],
            model_name: self.model.clone(),
            save_to: self.save_to.clone(),
            session_id: self.session_id(),
        };
        let reply = self.client.chat(&request, cancel).await?;

        let mut appended = Vec::new();
        for part in reply.into_messages() {
            let line = Message::assistant(format!("{}: {}", part.agent, part.text));
            self.store.append_message(&self.user, &room, line.clone())?;
            appended.push(line);
        }
        debug!(room = %room, replies = appended.len(), "reply stored");
        Ok(appended)
    }

    /// Room names in creation order.
    pub fn rooms(&self) -> ChatResult<Vec<String>> {
        Ok(self.store.rooms(&self.user)?)
    }

    /// Stored history of the current room.
    pub fn history(&self) -> ChatResult<Vec<Message>> {
        Ok(self.store.history(&self.user, &self.room)?)
    }

    /// History as shown on entering a room: an empty room gets a single
    /// notice line that is not stored.
    pub fn display_history(&self) -> ChatResult<Vec<Message>> {
        let history = self.history()?;
        if history.is_empty() {
            return Ok(vec![Message::system(format!(
                "No previous messages in {}.",
                self.room
            ))]);
        }
        Ok(history)
    }

    /// The current room's history rendered as HTML.
    pub fn transcript_html(&self) -> ChatResult<String> {
        Ok(render_transcript(&self.history()?))
    }

    /// Creates a room and switches to it. An existing room is switched to
    /// and reported as `RoomExists`.
    pub fn create_room(&mut self, name: &str) -> ChatResult<Option<String>> {
        match self.store.create_room(&self.user, name) {
            Ok(created) => {
                if let Some(room) = &created {
                    self.room.clone_from(room);
                }
                Ok(created)
            }
            Err(StoreError::RoomExists(room)) => {
                self.room.clone_from(&room);
                Err(StoreError::RoomExists(room).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn enter_room(&mut self, name: &str) -> ChatResult<Option<String>> {
        let entered = self.store.enter_room(&self.user, name)?;
        if let Some(room) = &entered {
            self.room.clone_from(room);
        }
        Ok(entered)
    }

    /// Deletes a room here and on the backend.
    ///
    /// The backend session is retired first; if that fails the room is kept.
    /// Returns the room that is current afterwards.
    pub async fn delete_room(&mut self, name: &str) -> ChatResult<String> {
        let name = name.trim();
        if !self.rooms()?.iter().any(|room| room == name) {
            return Err(StoreError::RoomNotFound(name.to_string()).into());
        }

        self.client
            .delete_session(&SessionId::new(&self.user, name))
            .await?;

        let data = self.store.delete_room(&self.user, name)?;
        info!(user = %self.user, room = name, "room deleted");
        self.room = data.last_room;
        Ok(self.room.clone())
    }

    /// Renames a room. Its backend session is retired first, since the
    /// session id is derived from the room name.
    pub async fn rename_room(&mut self, from: &str, to: &str) -> ChatResult<Option<String>> {
        let (from, to) = (from.trim(), to.trim());
        if to.is_empty() {
            return Ok(None);
        }
        let rooms = self.rooms()?;
        if !rooms.iter().any(|room| room == from) {
            return Err(StoreError::RoomNotFound(from.to_string()).into());
        }
        if rooms.iter().any(|room| room == to) {
            return Err(StoreError::RoomExists(to.to_string()).into());
        }

        self.client
            .delete_session(&SessionId::new(&self.user, from))
            .await?;

        let renamed = self.store.rename_room(&self.user, from, to)?;
        if self.room == from {
            self.room = to.to_string();
        }
        Ok(renamed)
    }
}

/// Renders stored messages as HTML, one `div` per message.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| {
            format!(
                "<div class=\"message {}\">{}</div>\n",
                message.role,
                markdown::render(&message.text)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::ApiErrorKind;
    use crate::store::{DEFAULT_ROOM, Role};

    fn session(server: &MockServer) -> ChatSession {
        session_with_store(server, RoomStore::in_memory())
    }

    fn session_with_store(server: &MockServer, store: RoomStore) -> ChatSession {
        let client = AgentClient::new(server.uri(), None).unwrap();
        ChatSession::login(store, client, "ada", SessionOptions::default()).unwrap()
    }

    async fn mount_delete(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/session/delete"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_resumes_last_room() {
        let server = MockServer::start().await;
        let store = RoomStore::in_memory();
        store.create_room("ada", "Lab").unwrap();

        let session = session_with_store(&server, store);
        assert_eq!(session.room(), "Lab");
        assert_eq!(session.session_id().as_str(), "ada::Lab");
        assert_eq!(session.active_agent(), "yapper");
    }

    #[tokio::test]
    async fn test_login_rejects_blank_user() {
        let server = MockServer::start().await;
        let client = AgentClient::new(server.uri(), None).unwrap();
        let result =
            ChatSession::login(RoomStore::in_memory(), client, "  ", SessionOptions::default());
        assert!(matches!(result, Err(ChatError::EmptyUser)));
    }

    #[tokio::test]
    async fn test_send_persists_both_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_partial_json(json!({
                "message": "hello",
                "session_id": "ada::General Chat"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"active_agent": "yapper", "response": "**hi**"})),
            )
            .mount(&server)
            .await;

        let mut session = session(&server);
        let replies = session.send("  hello ", None).await.unwrap();
        assert_eq!(replies.len(), 1);

        let history = session.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, "ada: hello");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].text, "yapper: **hi**");
        assert!(session.transcript_html().unwrap().contains("<strong>hi</strong>"));
    }

    #[tokio::test]
    async fn test_send_multi_agent_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agent_messages": [
                    {"agent": "yapper", "text": "one"},
                    {"agent": "definer", "text": "two"}
                ]
            })))
            .mount(&server)
            .await;

        let mut session = session(&server);
        session.send("go", None).await.unwrap();
        let texts: Vec<String> = session.history().unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["ada: go", "yapper: one", "definer: two"]);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_user_line_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
            .mount(&server)
            .await;

        let mut session = session(&server);
        let err = session.send("hello", None).await.unwrap_err();
        assert!(matches!(&err, ChatError::Api(e) if e.kind == ApiErrorKind::HttpStatus));
        assert_eq!(err.to_string(), "backend down");

        let history = session.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "ada: hello");
    }

    #[tokio::test]
    async fn test_send_blank_is_ignored() {
        let server = MockServer::start().await;
        let mut session = session(&server);
        assert!(session.send("   ", None).await.unwrap().is_empty());
        assert!(session.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_display_history_for_empty_room() {
        let server = MockServer::start().await;
        let session = session(&server);
        let shown = session.display_history().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].role, Role::System);
        assert_eq!(shown[0].text, "No previous messages in General Chat.");
        assert!(session.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_collision_switches_session() {
        let server = MockServer::start().await;
        let mut session = session(&server);
        session.create_room("Lab").unwrap();
        assert_eq!(session.room(), "Lab");

        let err = session.create_room(DEFAULT_ROOM).unwrap_err();
        assert!(matches!(err, ChatError::Store(StoreError::RoomExists(_))));
        assert_eq!(session.room(), DEFAULT_ROOM);
    }

    #[tokio::test]
    async fn test_delete_room_remote_failure_keeps_room() {
        let server = MockServer::start().await;
        mount_delete(&server, 500).await;

        let mut session = session(&server);
        session.create_room("Lab").unwrap();
        let err = session.delete_room("Lab").await.unwrap_err();
        assert!(matches!(err, ChatError::Api(_)));
        assert!(session.rooms().unwrap().contains(&"Lab".to_string()));
        assert_eq!(session.room(), "Lab");
    }

    #[tokio::test]
    async fn test_delete_room_repoints_current() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session/delete"))
            .and(body_partial_json(json!({"session_id": "ada::Lab"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session(&server);
        session.create_room("Lab").unwrap();
        assert_eq!(session.delete_room("Lab").await.unwrap(), DEFAULT_ROOM);
        assert_eq!(session.room(), DEFAULT_ROOM);
    }

    #[tokio::test]
    async fn test_delete_missing_room_skips_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session/delete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut session = session(&server);
        let err = session.delete_room("ghost").await.unwrap_err();
        assert!(matches!(err, ChatError::Store(StoreError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_current_room() {
        let server = MockServer::start().await;
        mount_delete(&server, 200).await;

        let mut session = session(&server);
        session.create_room("Old").unwrap();
        assert_eq!(
            session.rename_room("Old", "New").await.unwrap().as_deref(),
            Some("New")
        );
        assert_eq!(session.room(), "New");
        assert_eq!(session.session_id().as_str(), "ada::New");
    }

    #[tokio::test]
    async fn test_refresh_agents_and_select() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"agents": ["definer", "auditor"]})),
            )
            .mount(&server)
            .await;

        let mut session = session(&server);
        session.refresh_agents().await.unwrap();
        assert_eq!(session.active_agent(), "definer");
        assert!(session.set_agent("auditor"));
        assert!(!session.set_agent("yapper"));
        assert_eq!(session.active_agent(), "auditor");
    }

    #[test]
    fn test_render_transcript_escapes() {
        let html = render_transcript(&[Message::user("ada: <b>hi</b>")]);
        assert_eq!(
            html,
            "<div class=\"message user\"><p>ada: &lt;b&gt;hi&lt;/b&gt;</p></div>\n"
        );
    }
}
