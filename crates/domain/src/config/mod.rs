mod client;
mod observability;
mod relay;

pub use client::*;
pub use observability::*;
pub use relay::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tier::is_valid_model_id;

/// Env var naming the config file; falls back to [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "RC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "relaychat.toml";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One file configures both binaries: the client reads `[client]`, the
/// relay reads `[relay]` and `[observability]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Read and parse `path`.  A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// The path named by `RC_CONFIG`, or `relaychat.toml`.
    pub fn default_path() -> String {
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.validate_client();
        errors.extend(self.validate_relay());

        if self.client.max_contents > self.relay.max_contents {
            errors.push(ConfigError::warning(
                "client.max_contents",
                format!(
                    "client sends up to {} turns but the relay accepts {}",
                    self.client.max_contents, self.relay.max_contents
                ),
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be between 0.0 and 1.0",
            ));
        }

        errors
    }

    fn validate_client(&self) -> Vec<ConfigError> {
        let client = &self.client;
        let mut errors = Vec::new();

        if client.relay_url.is_empty() {
            errors.push(ConfigError::error("client.relay_url", "relay_url must not be empty"));
        }

        if client.tiers.is_empty() {
            errors.push(ConfigError::error("client.tiers", "at least one model tier is required"));
        } else if client.default_tier >= client.tiers.len() {
            errors.push(ConfigError::error(
                "client.default_tier",
                format!(
                    "default_tier {} is out of range (0..{})",
                    client.default_tier,
                    client.tiers.len()
                ),
            ));
        }

        for (i, tier) in client.tiers.iter().enumerate() {
            if !is_valid_model_id(&tier.identifier) {
                errors.push(ConfigError::error(
                    format!("client.tiers[{i}].id"),
                    format!("'{}' is not a valid model identifier", tier.identifier),
                ));
            }
        }

        if client.history.max_messages == 0 {
            errors.push(ConfigError::error(
                "client.history.max_messages",
                "max_messages must be greater than 0",
            ));
        }

        if client.max_contents == 0 {
            errors.push(ConfigError::error(
                "client.max_contents",
                "max_contents must be greater than 0",
            ));
        }

        if client.storage_key.is_empty() {
            errors.push(ConfigError::error("client.storage_key", "storage_key must not be empty"));
        }

        errors
    }

    fn validate_relay(&self) -> Vec<ConfigError> {
        let relay = &self.relay;
        let mut errors = Vec::new();

        if relay.port == 0 {
            errors.push(ConfigError::error("relay.port", "port must be greater than 0"));
        }

        if relay.host.is_empty() {
            errors.push(ConfigError::error("relay.host", "host must not be empty"));
        }

        if !relay.path.starts_with('/') {
            errors.push(ConfigError::error("relay.path", "path must start with '/'"));
        }

        if relay.upstream_base_url.is_empty() {
            errors.push(ConfigError::error(
                "relay.upstream_base_url",
                "upstream_base_url must not be empty",
            ));
        }

        if !is_valid_model_id(&relay.default_model) {
            errors.push(ConfigError::error(
                "relay.default_model",
                format!("'{}' is not a valid model identifier", relay.default_model),
            ));
        }

        for (i, model) in relay.allowed_models.iter().enumerate() {
            if !is_valid_model_id(model) {
                errors.push(ConfigError::error(
                    format!("relay.allowed_models[{i}]"),
                    format!("'{model}' is not a valid model identifier"),
                ));
            }
        }

        if relay.rate_limit.enabled
            && (relay.rate_limit.max_requests == 0 || relay.rate_limit.window_secs == 0)
        {
            errors.push(ConfigError::error(
                "relay.rate_limit",
                "max_requests and window_secs must be greater than 0",
            ));
        }

        if relay.cors.allowed_origins.len() == 1 && relay.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError::warning(
                "relay.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if relay.auth.key.is_some() {
            errors.push(ConfigError::warning(
                "relay.auth.key",
                "plaintext API key in config; prefer 'env' or keychain 'service'+'account'",
            ));
        }

        if relay.debug {
            errors.push(ConfigError::warning(
                "relay.debug",
                "upstream error bodies are mirrored to clients",
            ));
        }

        errors
    }
}
