//! `POST {relay.path}`: validate a chat request and forward it upstream.

use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use rc_domain::trace::TraceEvent;
use rc_domain::wire::RelayRequest;

use super::api_error;
use super::guard::ClientSource;
use crate::state::AppState;
use crate::upstream::UpstreamReply;
use crate::validate::{resolve_model, upstream_body, validate_contents};

pub async fn generate(
    State(state): State<AppState>,
    source: Option<Extension<ClientSource>>,
    body: Bytes,
) -> Response {
    let source = source.map(|Extension(s)| s.0).unwrap_or_else(|| "unknown".into());
    let reject = |status: StatusCode, reason: String| {
        TraceEvent::RelayRejected {
            source: source.clone(),
            status: status.as_u16(),
            reason: reason.clone(),
        }
        .emit();
        api_error(status, reason)
    };

    let Some(key) = state.credential.clone() else {
        tracing::error!("generation request refused: no upstream API key configured");
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server is missing the upstream API key".into(),
        );
    };

    let request: RelayRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return reject(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")),
    };
    if let Err(msg) = validate_contents(&request, &state.config) {
        return reject(StatusCode::BAD_REQUEST, msg);
    }
    let model = match resolve_model(&request.metadata, &state.config) {
        Ok(m) => m,
        Err(msg) => return reject(StatusCode::BAD_REQUEST, msg),
    };

    let payload = upstream_body(&request, &state.config);
    match state.upstream.generate(&model, &key, &payload).await {
        Ok(reply) if reply.is_success() => mirror(reply),
        Ok(reply) => {
            tracing::warn!(
                model = %model,
                status = reply.status,
                body = %String::from_utf8_lossy(&reply.body),
                "upstream returned an error"
            );
            if state.config.debug {
                mirror(reply)
            } else {
                let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
                api_error(status, "Upstream API error")
            }
        }
        Err(e) => {
            tracing::warn!(model = %model, error = %e, "upstream unreachable");
            api_error(StatusCode::BAD_GATEWAY, "Failed to reach the upstream API")
        }
    }
}

/// Relay the upstream status, content type, and body unchanged.
fn mirror(reply: UpstreamReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = reply
        .content_type
        .unwrap_or_else(|| "application/json".into());
    (
        status,
        [(header::CONTENT_TYPE, content_type)],
        Body::from(reply.body),
    )
        .into_response()
}
