//! Browser origin policy, shared by the CORS layer and the origin guard.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use rc_domain::config::CorsConfig;

/// Parsed `allowed_origins`.
///
/// Entries ending in `:*` match that scheme and host on any numeric port.
/// A lone `"*"` allows everything.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    any: bool,
    exact: Vec<String>,
    port_wildcards: Vec<String>,
}

impl OriginPolicy {
    pub fn from_config(cors: &CorsConfig) -> Self {
        let mut policy = Self::default();
        for origin in &cors.allowed_origins {
            let origin = origin.trim();
            if origin == "*" {
                policy.any = true;
            } else if let Some(prefix) = origin.strip_suffix('*').filter(|p| p.ends_with(':')) {
                policy.port_wildcards.push(prefix.to_owned());
            } else if !origin.is_empty() {
                policy.exact.push(origin.trim_end_matches('/').to_owned());
            }
        }
        policy
    }

    pub fn allows_any(&self) -> bool {
        self.any
    }

    pub fn allows(&self, origin: &str) -> bool {
        if self.any || self.exact.iter().any(|e| e == origin) {
            return true;
        }
        self.port_wildcards.iter().any(|prefix| {
            origin
                .strip_prefix(prefix.as_str())
                .is_some_and(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        })
    }
}

/// Build the [`CorsLayer`] for `policy`.
pub fn cors_layer(policy: &OriginPolicy) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::RETRY_AFTER]);

    if policy.allows_any() {
        tracing::warn!("CORS configured with wildcard \"*\"; every origin is allowed");
        return base.allow_origin(Any);
    }

    let policy = policy.clone();
    base.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _| origin.to_str().map(|o| policy.allows(o)).unwrap_or(false),
    ))
}
