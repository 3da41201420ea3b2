use axum::response::IntoResponse;
use serde_json::json;

pub(crate) fn handler() -> impl IntoResponse {
    axum::Json(json!({ "status": "ok" }))
}
