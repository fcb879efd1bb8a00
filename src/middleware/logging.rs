use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use std::time::Instant;

use crate::{app_state::AppState, error::ApiError};

const LOGGED_BODY_CHARS: usize = 2000;

/// Middleware that logs request and response bodies
///
/// Also enforces the request body cap, since it buffers the body first.
/// Headers are not logged; they carry bearer tokens.
pub async fn logging_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let max_body = state.config.server.max_body_bytes;

    let declared_len = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > max_body) {
        tracing::warn!(request_id = %request_id, "Rejected oversized request body");
        return ApiError::PayloadTooLarge.into_response();
    }

    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, max_body).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_length_limit(&e) => {
            tracing::warn!(request_id = %request_id, "Rejected oversized request body");
            return ApiError::PayloadTooLarge.into_response();
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, "Failed to read request body: {}", e);
            return ApiError::InvalidRequestBody("Failed to read request body".to_string())
                .into_response();
        }
    };

    let request_body = String::from_utf8_lossy(&bytes);
    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        body = %truncate_body(&request_body, LOGGED_BODY_CHARS),
        "→ Request"
    );

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let status = response.status();
    let (parts, body) = response.into_parts();

    let bytes = match to_bytes(body, max_body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
            Bytes::new()
        }
    };

    let response_body = String::from_utf8_lossy(&bytes);
    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %start.elapsed().as_millis(),
        body = %truncate_body(&response_body, LOGGED_BODY_CHARS),
        "← Response"
    );

    Response::from_parts(parts, Body::from(bytes))
}

/// Whether a body read failed because the body hit the size cap
fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Truncate body for logging, adding ellipsis if truncated
fn truncate_body(body: &str, max_chars: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max_chars) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}...[truncated, {} bytes total]",
            &body[..cut],
            body.len()
        ),
    }
}
