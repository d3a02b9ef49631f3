//! Transport from the chat client to the relay.

use std::time::Duration;

use async_trait::async_trait;
use rc_domain::error::{Error, Result};
use rc_domain::wire::RelayRequest;

use crate::normalize::RawReply;

/// Longest relay error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 2_000;

/// Sends one generation request to the relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, request: &RelayRequest) -> Result<RawReply>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpRelayClient {
    url: String,
    client: reqwest::Client,
}

impl HttpRelayClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RelayTransport for HttpRelayClient {
    async fn send(&self, request: &RelayRequest) -> Result<RawReply> {
        tracing::debug!(
            url = %self.url,
            model = request.metadata.model.as_deref().unwrap_or("-"),
            contents = request.contents.len(),
            "relay request"
        );

        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            // Only the relay's own limiter sets Retry-After.
            if let (429, Some(secs)) = (status.as_u16(), retry_after) {
                return Err(Error::Throttled {
                    retry_after_secs: secs,
                });
            }
            return Err(Error::Relay {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(match serde_json::from_str(&body) {
            Ok(value) => RawReply::Structured(value),
            Err(_) => RawReply::Text(body),
        })
    }
}

/// `{"error": "<string>"}` bodies collapse to the string; anything else is
/// kept whole (truncated) so upstream failure markers stay visible.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    if let Some(msg) = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.as_str())
    {
        return msg.to_owned();
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
    } else {
        trimmed.to_owned()
    }
}

/// The relay URL is dropped so it never reaches user-facing messages.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    let timed_out = e.is_timeout();
    let e = e.without_url();
    if timed_out {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
