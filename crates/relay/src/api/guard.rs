//! Request guards for the generate route.
//!
//! Both run via `axum::middleware::from_fn_with_state`.  A request with no
//! `Origin` header is a non-browser client and passes the origin check.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};

use rc_domain::trace::TraceEvent;

use super::api_error;
use crate::limiter::Decision;
use crate::state::AppState;

/// Where a request came from, as seen by the limiter.  Inserted into the
/// request extensions by [`rate_limit`].
#[derive(Debug, Clone)]
pub struct ClientSource(pub String);

/// Reject browser requests from origins outside the allow list.
pub async fn check_origin(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default().to_owned());

    if let Some(origin) = origin {
        if !state.origins.allows(&origin) {
            TraceEvent::RelayRejected {
                source: origin,
                status: 403,
                reason: "origin not allowed".into(),
            }
            .emit();
            return api_error(StatusCode::FORBIDDEN, "Origin not allowed");
        }
    }

    next.run(req).await
}

/// Apply the per-source window budget.
pub async fn rate_limit(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let source = source_of(&req, state.config.rate_limit.trust_forwarded_for);

    if let Some(limiter) = &state.limiter {
        if let Decision::Limited { retry_after_secs } = limiter.check(&source) {
            tracing::info!(source = %source, retry_after_secs, "rate limited");
            TraceEvent::RelayRejected {
                source,
                status: 429,
                reason: "rate limited".into(),
            }
            .emit();
            return too_many_requests(retry_after_secs);
        }
    }

    req.extensions_mut().insert(ClientSource(source));
    next.run(req).await
}

fn too_many_requests(retry_after_secs: u64) -> Response {
    let mut resp = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "Too many requests. Please slow down.",
            "retry_after": retry_after_secs,
        })),
    )
        .into_response();
    resp.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    resp
}

/// The peer IP, or the first `X-Forwarded-For` hop when trusted.
fn source_of(req: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let first_hop = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = first_hop {
            return hop.to_owned();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(xff: Option<&str>, peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/generate");
        if let Some(xff) = xff {
            builder = builder.header("x-forwarded-for", xff);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }
        req
    }

    #[test]
    fn peer_address_by_default() {
        let req = request(Some("203.0.113.9"), Some("10.0.0.2:5555"));
        assert_eq!(source_of(&req, false), "10.0.0.2");
    }

    #[test]
    fn forwarded_for_when_trusted() {
        let req = request(Some(" 203.0.113.9 , 10.0.0.1"), Some("10.0.0.2:5555"));
        assert_eq!(source_of(&req, true), "203.0.113.9");

        let no_header = request(None, Some("10.0.0.2:5555"));
        assert_eq!(source_of(&no_header, true), "10.0.0.2");
    }

    #[test]
    fn unknown_without_any_hint() {
        assert_eq!(source_of(&request(None, None), false), "unknown");
    }

    #[test]
    fn throttle_response_carries_retry_after() {
        let resp = too_many_requests(42);
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "42");
    }
}
