use std::sync::Arc;
use std::time::Duration;

use rc_domain::config::RelayConfig;
use rc_domain::error::Result;

use crate::credential::resolve_api_key;
use crate::limiter::SourceLimiter;
use crate::origin::OriginPolicy;
use crate::upstream::UpstreamClient;

/// Shared state passed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    /// `None` when no key could be resolved; generation requests then fail
    /// with 500 while `/healthz` keeps answering.
    pub credential: Option<Arc<str>>,
    pub origins: Arc<OriginPolicy>,
    /// `None` when rate limiting is disabled.
    pub limiter: Option<Arc<SourceLimiter>>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(config: RelayConfig, credential: Option<String>) -> Result<Self> {
        let upstream = UpstreamClient::new(
            &config.upstream_base_url,
            Duration::from_secs(config.upstream_timeout_secs),
        )?;
        Ok(Self {
            credential: credential.map(Arc::from),
            origins: Arc::new(OriginPolicy::from_config(&config.cors)),
            limiter: SourceLimiter::from_config(&config.rate_limit).map(Arc::new),
            upstream: Arc::new(upstream),
            config: Arc::new(config),
        })
    }

    /// Build state, resolving the upstream key from `config.auth`.
    pub fn from_config(config: RelayConfig) -> Result<Self> {
        let credential = match resolve_api_key(&config.auth) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "no upstream key; generation requests will fail");
                None
            }
        };
        Self::new(config, credential)
    }
}
