mod chat;
mod health;

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::error_payload;
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

enum RouteMatch {
    Health,
    ChatCompletions,
    Preflight,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path());

    let mut response = match route {
        RouteMatch::Health => health::handler().into_response(),
        RouteMatch::Preflight => StatusCode::NO_CONTENT.into_response(),
        RouteMatch::ChatCompletions => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            chat::handler(state, body_bytes).await
        }
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    apply_cors(response.headers_mut());
    Ok(response)
}

fn match_route(method: &Method, path: &str) -> RouteMatch {
    if method == Method::OPTIONS {
        return RouteMatch::Preflight;
    }

    match path {
        "/" => {
            if method == Method::GET {
                RouteMatch::Health
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/v1/chat/completions" => {
            if method == Method::POST {
                RouteMatch::ChatCompletions
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        _ => RouteMatch::NotFound,
    }
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        "access-control-allow-origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-credentials",
        HeaderValue::from_static("true"),
    );
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|err| {
            let payload = error_payload(&format!("failed to read request body: {err}"));
            (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(payload)).into_response()
        })
}
