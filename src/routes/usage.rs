use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::net::SocketAddr;
use time::OffsetDateTime;

use crate::{
    app_state::AppState,
    error::ApiError,
    models::usage::ConsumeCreditsRequest,
    services::usage_service::RequestContext,
};

/// /api/usage/consume (every method lands here)
///
/// `OPTIONS` is a no-op preflight, `POST` consumes credits, anything else is 405.
pub async fn consume_credits(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    if method != Method::POST {
        return ApiError::MethodNotAllowed.into_response();
    }

    let expose_details = !state.config.application.is_production();

    let request = match ConsumeCreditsRequest::from_bytes(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response_with_details(expose_details),
    };

    let context = RequestContext {
        authorization: header_str(&headers, header::AUTHORIZATION.as_str()),
        ip_address: client_ip(&headers, peer.map(|Extension(ConnectInfo(addr))| addr)),
        user_agent: header_str(&headers, header::USER_AGENT.as_str()),
        received_at: OffsetDateTime::now_utc(),
    };

    match state.usage_service.consume(&request, context).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response_with_details(expose_details),
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|forwarded| {
            forwarded
                .split(',')
                .map(str::trim)
                .find(|hop| !hop.is_empty())
                .map(str::to_string)
        })
        .or_else(|| header_str(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
