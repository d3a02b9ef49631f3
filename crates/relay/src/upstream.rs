//! Client for the upstream `generateContent` API.

use std::time::{Duration, Instant};

use axum::body::Bytes;
use serde_json::Value;

use rc_domain::error::{Error, Result};
use rc_domain::trace::TraceEvent;

/// A raw upstream response, relayed back to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct UpstreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn generate_url(&self, model: &str, key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, key
        )
    }

    /// POST `body` to the model's `generateContent` endpoint.
    ///
    /// Any HTTP response, success or not, is returned as an
    /// [`UpstreamReply`]; only transport failures are errors.
    pub async fn generate(&self, model: &str, key: &str, body: &Value) -> Result<UpstreamReply> {
        let url = self.generate_url(model, key);
        tracing::debug!(url = %redact_url_key(&url), "upstream request");

        let started = Instant::now();
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().await.map_err(from_reqwest)?;

        TraceEvent::RelayForward {
            model: model.to_owned(),
            status,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}

/// Replace the `key=` query value so URLs can be logged.
pub fn redact_url_key(url: &str) -> String {
    match url.find("key=") {
        Some(idx) => {
            let (prefix, rest) = url.split_at(idx + 4);
            let end = rest.find('&').unwrap_or(rest.len());
            format!("{prefix}[REDACTED]{}", &rest[end..])
        }
        None => url.to_owned(),
    }
}

// reqwest error strings can embed the request URL, key included.
fn from_reqwest(e: reqwest::Error) -> Error {
    let timed_out = e.is_timeout();
    let message = redact_url_key(&e.without_url().to_string());
    if timed_out {
        Error::Timeout(message)
    } else {
        Error::Http(message)
    }
}
