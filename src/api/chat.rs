use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use futures_util::{Stream, StreamExt};

use crate::error::ProxyError;
use crate::protocol::backend::ConversationRequest;
use crate::protocol::openai::{
    self, ChatCompletion, ChatCompletionChunk, ChatCompletionRequest,
};
use crate::state::AppState;
use crate::stream::{event_payload_stream, DeltaExtractor, DeltaTracker};
use crate::util::completion_id;

pub(crate) async fn handler(state: Arc<AppState>, body: bytes::Bytes) -> Response {
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return ProxyError::InvalidRequest(format!("malformed request body: {err}"))
                .into_response()
        }
    };

    match respond(state, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!("chat completion failed: {err}");
            err.into_response()
        }
    }
}

async fn respond(
    state: Arc<AppState>,
    request: ChatCompletionRequest,
) -> Result<Response, ProxyError> {
    let credential = state.sessions.ready().await;
    let conversation =
        ConversationRequest::from_messages(&request.messages, &state.config.backend.backend_model);
    let response = state
        .transport
        .open_conversation(&credential, &conversation)
        .await?;

    let request_id = completion_id();
    let model = state.config.backend.served_model.clone();
    let extractor = DeltaExtractor::new(&request.messages);
    let payloads = event_payload_stream(response.bytes_stream());

    if request.stream {
        return Ok(streaming_response(payloads, extractor, request_id, model));
    }

    let mut tracker = DeltaTracker::new();
    futures_util::pin_mut!(payloads);
    while let Some(payload) = payloads.next().await {
        let payload = payload?;
        if let Some(cumulative) = extractor.extract(&payload)? {
            tracker.observe(&cumulative);
        }
    }

    let completion = ChatCompletion::new(request_id, &model, tracker.into_text());
    Ok(axum::Json(completion).into_response())
}

/// Build the live SSE response: one chunk frame per growing delta. A decode
/// or transport error mid-stream has no standardized recovery once chunks
/// have been sent, so it terminates the stream.
fn streaming_response(
    payloads: impl Stream<Item = Result<String, ProxyError>> + Send + 'static,
    extractor: DeltaExtractor,
    request_id: String,
    model: String,
) -> Response {
    let frames = futures_util::stream::unfold(
        (
            Box::pin(payloads),
            extractor,
            DeltaTracker::new(),
            request_id,
            model,
        ),
        |(mut payloads, extractor, mut tracker, request_id, model)| async move {
            loop {
                let payload = match payloads.next().await? {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!("terminating stream: {err}");
                        return None;
                    }
                };
                let cumulative = match extractor.extract(&payload) {
                    Ok(Some(cumulative)) => cumulative,
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::warn!("terminating stream: {err}");
                        return None;
                    }
                };
                let Some(delta) = tracker.push(&cumulative) else {
                    continue;
                };
                let chunk = ChatCompletionChunk::new(&request_id, &model, delta);
                let frame = match serde_json::to_string(&chunk) {
                    Ok(json) => openai::sse_frame(&json),
                    Err(err) => {
                        tracing::warn!("terminating stream: {err}");
                        return None;
                    }
                };
                return Some((
                    bytes::Bytes::from(frame),
                    (payloads, extractor, tracker, request_id, model),
                ));
            }
        },
    );

    let body = Body::from_stream(frames.map(Ok::<bytes::Bytes, Infallible>));
    sse_ok_response(body)
}

fn sse_ok_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
