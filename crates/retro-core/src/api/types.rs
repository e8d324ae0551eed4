//! Wire shapes of the agent backend.

use serde::{Deserialize, Serialize};

use crate::store::SessionId;

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub active_agent: String,
    pub enabled_agents: Vec<String>,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_to: Option<String>,
    pub session_id: SessionId,
}

/// One agent's contribution to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub agent: String,
    pub text: String,
}

/// Body of a successful `POST /chat` response.
///
/// The backend answers either with a single agent's response or with a
/// list of messages from several agents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    Multi { agent_messages: Vec<AgentMessage> },
    Single { active_agent: String, response: String },
}

impl ChatReply {
    /// Flattens the reply into per-agent messages, in display order.
    pub fn into_messages(self) -> Vec<AgentMessage> {
        match self {
            ChatReply::Multi { agent_messages } => agent_messages,
            ChatReply::Single {
                active_agent,
                response,
            } => vec![AgentMessage {
                agent: active_agent,
                text: response,
            }],
        }
    }
}

/// Body of `POST /session/delete`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteSessionRequest<'a> {
    pub session_id: &'a SessionId,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chat_request_omits_empty_save_to() {
        let request = ChatRequest {
            message: "hi".to_string(),
            active_agent: "yapper".to_string(),
            enabled_agents: vec!["yapper".to_string()],
            model_name: "gpt-4o-mini".to_string(),
            save_to: None,
            session_id: SessionId::new("ada", "General Chat"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "message": "hi",
                "active_agent": "yapper",
                "enabled_agents": ["yapper"],
                "model_name": "gpt-4o-mini",
                "session_id": "ada::General Chat"
            })
        );
    }

    #[test]
    fn test_reply_single_ignores_extra_fields() {
        let reply: ChatReply = serde_json::from_value(json!({
            "active_agent": "definer",
            "response": "a word",
            "tool_results": []
        }))
        .unwrap();
        assert_eq!(
            reply.into_messages(),
            vec![AgentMessage {
                agent: "definer".to_string(),
                text: "a word".to_string()
            }]
        );
    }

    #[test]
    fn test_reply_multi_keeps_order() {
        let reply: ChatReply = serde_json::from_value(json!({
            "agent_messages": [
                {"agent": "yapper", "text": "one"},
                {"agent": "auditor", "text": "two"}
            ]
        }))
        .unwrap();
        let agents: Vec<String> = reply.into_messages().into_iter().map(|m| m.agent).collect();
        assert_eq!(agents, vec!["yapper", "auditor"]);
    }

    #[test]
    fn test_reply_unknown_shape_is_error() {
        assert!(serde_json::from_value::<ChatReply>(json!({"ok": true})).is_err());
    }
}
