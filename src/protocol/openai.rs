//! Chat-completion API wire types: the inbound request shape and the two
//! outbound response shapes (one-shot completion and streaming chunk).

use serde::{Deserialize, Serialize};

use crate::util::unix_now_secs;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub message: AssistantMessage,
    pub finish_reason: &'static str,
    pub index: u32,
    pub logprobs: Option<()>,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Non-streaming completion object. Usage is always zeroed: the anonymous
/// backend reports no token counts.
#[derive(Debug, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub created: u64,
    pub model: String,
    pub object: &'static str,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

impl ChatCompletion {
    #[must_use]
    pub fn new(id: String, model: &str, content: String) -> Self {
        Self {
            id,
            created: unix_now_secs(),
            model: model.to_string(),
            object: "chat.completion",
            choices: vec![CompletionChoice {
                message: AssistantMessage {
                    role: "assistant",
                    content,
                },
                finish_reason: "stop",
                index: 0,
                logprobs: None,
            }],
            usage: Usage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub index: u32,
    pub finish_reason: Option<()>,
}

/// One streaming chunk, carrying only the newly added substring.
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub created: u64,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    #[must_use]
    pub fn new(id: &str, model: &str, delta: String) -> Self {
        Self {
            id: id.to_string(),
            created: unix_now_secs(),
            object: "chat.completion.chunk",
            model: model.to_string(),
            choices: vec![ChunkChoice {
                delta: ChunkDelta { content: delta },
                index: 0,
                finish_reason: None,
            }],
        }
    }
}

/// Format a chat-completion SSE frame (no event type, just data).
#[must_use]
pub fn sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}
