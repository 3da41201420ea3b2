use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error type used across all modules.
///
/// `Credential` errors stay inside the refresh loop and are never surfaced
/// to a request; everything else is request-scoped and rendered through
/// [`error_payload`] at the handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Credential refresh error: {0}")]
    Credential(String),
    #[error("Backend decode error: {0}")]
    Decode(String),
    #[error("Backend transport error: {0}")]
    Transport(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => http::StatusCode::BAD_REQUEST,
            ProxyError::Decode(_) | ProxyError::Transport(_) => http::StatusCode::BAD_GATEWAY,
            ProxyError::Config(_) | ProxyError::Credential(_) | ProxyError::Internal(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Request-scoped error envelope returned to callers.
#[must_use]
pub fn error_payload(message: &str) -> serde_json::Value {
    json!({
        "status": false,
        "error": {
            "message": message,
            "type": "invalid_request_error",
        }
    })
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = error_payload(&self.to_string());
        (status, axum::Json(body)).into_response()
    }
}
