use crate::error::ProxyError;
use crate::protocol::backend::BackendEvent;
use crate::protocol::openai::ChatMessage;

/// Parses event payloads and extracts the cumulative assistant text.
///
/// The backend occasionally echoes an input turn back as if it were output;
/// any extracted text that matches one of the request's message contents
/// verbatim is discarded.
pub struct DeltaExtractor {
    input_contents: Vec<String>,
}

impl DeltaExtractor {
    #[must_use]
    pub fn new(messages: &[ChatMessage]) -> Self {
        Self {
            input_contents: messages.iter().map(|m| m.content.clone()).collect(),
        }
    }

    /// Extract the cumulative text from one payload.
    ///
    /// Returns `Ok(None)` for echoed input turns. A payload that fails to
    /// parse aborts extraction for the whole request: partial success is
    /// not silently swallowed.
    pub fn extract(&self, payload: &str) -> Result<Option<String>, ProxyError> {
        let event: BackendEvent = serde_json::from_str(payload)
            .map_err(|err| ProxyError::Decode(format!("malformed backend event: {err}")))?;
        let text = event.cumulative_text();
        if self.input_contents.iter().any(|content| content == &text) {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

/// Longest-growth-wins accumulator over cumulative text values.
///
/// Assumes the backend only ever extends prior cumulative text: each longer
/// value is expected to be a prefix extension of the previous one. This is
/// load-bearing for delta computation and is not validated; if the backend
/// revises earlier tokens, the fallback removes one occurrence of the
/// previous value instead of the prefix.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    previous: String,
}

impl DeltaTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a cumulative value and return the newly added substring, if
    /// any. Shorter or equal-length updates never become the new baseline
    /// and produce no delta.
    pub fn push(&mut self, cumulative: &str) -> Option<String> {
        if cumulative.len() <= self.previous.len() {
            return None;
        }
        let delta = match cumulative.strip_prefix(self.previous.as_str()) {
            Some(rest) => rest.to_owned(),
            None => cumulative.replacen(self.previous.as_str(), "", 1),
        };
        self.previous = cumulative.to_owned();
        Some(delta)
    }

    /// Observe a cumulative value without producing a delta (non-streaming
    /// path).
    pub fn observe(&mut self, cumulative: &str) {
        let _ = self.push(cumulative);
    }

    /// The longest cumulative text seen.
    #[must_use]
    pub fn into_text(self) -> String {
        self.previous
    }
}
