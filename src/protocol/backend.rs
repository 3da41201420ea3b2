//! Wire types for the anonymous backend: the outbound conversation request
//! and the inbound event payload the delta extractor consumes.

use serde::{Deserialize, Serialize};

use crate::protocol::openai::ChatMessage;
use crate::util::random_uuid;

/// Response body of the credential-issuance endpoint.
#[derive(Debug, Deserialize)]
pub struct CredentialIssuance {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct Author {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct MessageContent {
    pub content_type: &'static str,
    pub parts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BackendMessage {
    pub author: Author,
    pub content: MessageContent,
}

#[derive(Debug, Serialize)]
pub struct ConversationMode {
    pub kind: &'static str,
}

/// Conversation request body. The metadata fields are fixed values the
/// backend expects from an anonymous browser session.
#[derive(Debug, Serialize)]
pub struct ConversationRequest {
    pub action: &'static str,
    pub messages: Vec<BackendMessage>,
    pub parent_message_id: String,
    pub model: String,
    pub timezone_offset_min: i32,
    pub suggestions: Vec<String>,
    pub history_and_training_disabled: bool,
    pub conversation_mode: ConversationMode,
    pub websocket_request_id: String,
}

impl ConversationRequest {
    #[must_use]
    pub fn from_messages(messages: &[ChatMessage], model: &str) -> Self {
        let mapped = messages
            .iter()
            .map(|message| BackendMessage {
                author: Author {
                    role: message.role.clone(),
                },
                content: MessageContent {
                    content_type: "text",
                    parts: vec![message.content.clone()],
                },
            })
            .collect();

        Self {
            action: "next",
            messages: mapped,
            parent_message_id: random_uuid(),
            model: model.to_string(),
            timezone_offset_min: -180,
            suggestions: Vec::new(),
            history_and_training_disabled: true,
            conversation_mode: ConversationMode {
                kind: "primary_assistant",
            },
            websocket_request_id: random_uuid(),
        }
    }
}

/// Backend event payload. Only `message.content.parts[0]` is contract
/// relevant: the cumulative assistant text so far for this turn.
#[derive(Debug, Deserialize)]
pub struct BackendEvent {
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub content: Option<EventContent>,
}

#[derive(Debug, Deserialize)]
pub struct EventContent {
    #[serde(default)]
    pub parts: Vec<Option<String>>,
}

impl BackendEvent {
    /// Extract the cumulative assistant text; absent or null fields map to
    /// the empty string.
    #[must_use]
    pub fn cumulative_text(self) -> String {
        self.message
            .and_then(|message| message.content)
            .and_then(|content| content.parts.into_iter().next())
            .flatten()
            .unwrap_or_default()
    }
}
