//! End-to-end relay behavior against an in-process stand-in upstream.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use rc_domain::config::RelayConfig;
use rc_relay::api;
use rc_relay::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stand-in upstream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
struct Seen {
    model_action: String,
    key: String,
    body: Value,
}

type SeenLog = Arc<Mutex<Vec<Seen>>>;

async fn fake_generate(
    State(seen): State<SeenLog>,
    Path(model_action): Path<String>,
    Query(query): Query<std::collections::HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    seen.lock().push(Seen {
        model_action: model_action.clone(),
        key: query.get("key").cloned().unwrap_or_default(),
        body,
    });

    match model_action.trim_end_matches(":generateContent") {
        "gemini-2.5-pro" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}})),
        )
            .into_response(),
        "gemini-2.0-flash" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => Json(json!({"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]})).into_response(),
    }
}

async fn spawn_upstream() -> (String, SeenLog) {
    let seen: SeenLog = Arc::default();
    let app = Router::new()
        .route("/v1beta/models/:model_action", post(fake_generate))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn config(upstream: &str) -> RelayConfig {
    RelayConfig {
        upstream_base_url: upstream.into(),
        ..RelayConfig::default()
    }
}

fn app(cfg: RelayConfig) -> Router {
    api::router(AppState::new(cfg, Some("test-key".into())).unwrap())
}

fn chat_body(model: Option<&str>) -> Value {
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
        "metadata": {"preset": "precise"}
    });
    if let Some(model) = model {
        body["metadata"]["model"] = json!(model);
    }
    body
}

fn post_json(body: &Value) -> Request<Body> {
    post_from(body, "127.0.0.1:40000", None)
}

fn post_from(body: &Value, peer: &str, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    let mut req = builder.body(Body::from(body.to_string())).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    req
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, headers, value)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Forwarding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn forwards_and_mirrors_success() {
    let (upstream, seen) = spawn_upstream().await;

    let (status, headers, body) =
        send(app(config(&upstream)), post_json(&chat_body(Some("gemini-2.5-flash")))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    assert_eq!(body["candidates"][0]["content"]["parts"][0]["text"], "Hi");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].model_action, "gemini-2.5-flash:generateContent");
    assert_eq!(seen[0].key, "test-key");
    assert!(seen[0].body.get("metadata").is_none());
    assert_eq!(seen[0].body["generationConfig"]["temperature"], json!(0.2));
    assert_eq!(seen[0].body["contents"][0]["parts"][0]["text"], "hello");
}

#[tokio::test]
async fn default_model_when_metadata_has_none() {
    let (upstream, seen) = spawn_upstream().await;

    let (status, _, _) = send(app(config(&upstream)), post_json(&chat_body(None))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen.lock()[0].model_action, "gemini-2.5-flash:generateContent");
}

#[tokio::test]
async fn upstream_errors_are_masked_but_keep_status() {
    let (upstream, _) = spawn_upstream().await;

    let (status, _, body) =
        send(app(config(&upstream)), post_json(&chat_body(Some("gemini-2.5-pro")))).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"error": "Upstream API error"}));
}

#[tokio::test]
async fn debug_mode_mirrors_upstream_errors() {
    let (upstream, _) = spawn_upstream().await;
    let cfg = RelayConfig {
        debug: true,
        ..config(&upstream)
    };

    let (status, _, body) = send(app(cfg.clone()), post_json(&chat_body(Some("gemini-2.5-pro")))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["status"], "RESOURCE_EXHAUSTED");

    let (status, _, body) = send(app(cfg), post_json(&chat_body(Some("gemini-2.0-flash")))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!("boom"));
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (status, _, body) = send(app(config(&dead)), post_json(&chat_body(None))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rejections
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn missing_credential_is_500() {
    let (upstream, seen) = spawn_upstream().await;
    let app = api::router(AppState::new(config(&upstream), None).unwrap());

    let (status, _, body) = send(app, post_json(&chat_body(None))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("API key"));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn invalid_requests_are_400() {
    let (upstream, seen) = spawn_upstream().await;
    let mut cfg = config(&upstream);
    cfg.allowed_models = vec!["gemini-2.5-flash".into()];

    let too_many: Vec<Value> = (0..11)
        .map(|_| json!({"role": "user", "parts": [{"text": "x"}]}))
        .collect();
    let cases = vec![
        json!({"contents": []}),
        json!({"contents": too_many}),
        json!({"contents": [{"role": "system", "parts": [{"text": "x"}]}]}),
        json!({"contents": [{"role": "user", "parts": []}]}),
        json!({"contents": [{"role": "user", "parts": [{"text": "x".repeat(8001)}]}]}),
        json!({"contents": [{"role": "user", "parts": [{"text": 5}]}]}),
        json!({"metadata": {}}),
        chat_body(Some("../../v1/files")),
        chat_body(Some("gemini-2.5-pro")),
    ];

    for case in cases {
        let (status, _, body) = send(app(cfg.clone()), post_json(&case)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case: {case}");
        assert!(body["error"].is_string());
    }

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, _) = send(app(cfg), malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn disallowed_origin_is_403() {
    let (upstream, seen) = spawn_upstream().await;

    let req = post_from(&chat_body(None), "127.0.0.1:40000", Some("https://evil.example"));
    let (status, _, body) = send(app(config(&upstream)), req).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "Origin not allowed"}));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn allowed_origin_gets_cors_headers() {
    let (upstream, _) = spawn_upstream().await;

    let req = post_from(&chat_body(None), "127.0.0.1:40000", Some("http://localhost:5173"));
    let (status, headers, _) = send(app(config(&upstream)), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn per_source_budget_returns_429_with_retry_after() {
    let (upstream, _) = spawn_upstream().await;
    let mut cfg = config(&upstream);
    cfg.rate_limit.max_requests = 2;
    cfg.rate_limit.window_secs = 60;
    let app = app(cfg);

    for _ in 0..2 {
        let (status, _, _) = send(app.clone(), post_from(&chat_body(None), "10.0.0.1:1000", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) =
        send(app.clone(), post_from(&chat_body(None), "10.0.0.1:2000", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(body["retry_after"], json!(retry_after));
    assert!(body["error"].is_string());

    // Another source still has its own budget.
    let (status, _, _) = send(app, post_from(&chat_body(None), "10.0.0.2:1000", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (upstream, seen) = spawn_upstream().await;
    let mut cfg = config(&upstream);
    cfg.max_body_bytes = 1024;

    let body = json!({"contents": [{"role": "user", "parts": [{"text": "x".repeat(4096)}]}]});
    let (status, _, _) = send(app(cfg), post_json(&body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(seen.lock().is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Health
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn healthz_reports_credential_presence() {
    let with_key = app(RelayConfig::default());
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let (status, _, body) = send(with_key, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "credential": true}));

    let without = api::router(AppState::new(RelayConfig::default(), None).unwrap());
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let (_, _, body) = send(without, req).await;
    assert_eq!(body["credential"], false);
}
