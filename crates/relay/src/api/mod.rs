//! HTTP surface of the relay.
//!
//! - `POST {relay.path}`: validate, then forward to the upstream model
//! - `GET /healthz`: liveness plus whether a credential is loaded

pub mod generate;
pub mod guard;
pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::origin::cors_layer;
use crate::state::AppState;

/// The full relay application, layers included.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    // Layers run outermost-last: origin check, then the limiter.
    let generate = Router::new()
        .route(&cfg.path, post(generate::generate))
        .layer(from_fn_with_state(state.clone(), guard::rate_limit))
        .layer(from_fn_with_state(state.clone(), guard::check_origin));

    Router::new()
        .route("/healthz", get(health::healthz))
        .merge(generate)
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
        .layer(cors_layer(&state.origins))
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(cfg.max_concurrent))
        .with_state(state)
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
