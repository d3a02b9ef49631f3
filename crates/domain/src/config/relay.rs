use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "d_8787")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Route the relay answers on.
    #[serde(default = "d_path")]
    pub path: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Where the upstream API key comes from.
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "d_upstream")]
    pub upstream_base_url: String,
    /// Model used when a request carries no `metadata.model`.
    #[serde(default = "d_default_model")]
    pub default_model: String,
    /// When non-empty, only these model identifiers are forwarded.
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "d_10")]
    pub max_contents: usize,
    #[serde(default = "d_8000")]
    pub max_part_chars: usize,
    #[serde(default = "d_body_bytes")]
    pub max_body_bytes: usize,
    /// Mirror upstream error bodies verbatim instead of masking them.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "d_60")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "d_64")]
    pub max_concurrent: usize,
    /// Named generation settings selected by `metadata.preset`.
    #[serde(default = "d_presets")]
    pub presets: BTreeMap<String, PresetConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            host: d_host(),
            path: d_path(),
            cors: CorsConfig::default(),
            auth: AuthConfig::default(),
            upstream_base_url: d_upstream(),
            default_model: d_default_model(),
            allowed_models: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            max_contents: 10,
            max_part_chars: 8000,
            max_body_bytes: d_body_bytes(),
            debug: false,
            upstream_timeout_secs: 60,
            max_concurrent: 64,
            presets: d_presets(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the relay.  Entries may end in `:*` to allow
    /// any port.  `["*"]` allows every origin (not recommended).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

/// Upstream credential lookup.
///
/// Resolution order: `key` (plaintext), OS keychain (`service` + `account`),
/// `env`, then the `{SERVICE}_{ACCOUNT}` env fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "d_key_env")]
    pub env: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            key: None,
            env: d_key_env(),
            service: None,
            account: None,
        }
    }
}

/// Request budget per source address: `max_requests` per `window_secs`,
/// refilled evenly across the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_20")]
    pub max_requests: u32,
    #[serde(default = "d_60")]
    pub window_secs: u64,
    /// Key requests by the first `X-Forwarded-For` hop instead of the peer
    /// address.  Only enable behind a proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_secs: 60,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8787() -> u16 {
    8787
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_path() -> String {
    "/api/generate".into()
}
fn d_upstream() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn d_default_model() -> String {
    "gemini-2.5-flash".into()
}
fn d_key_env() -> Option<String> {
    Some("GEMINI_API_KEY".into())
}
fn d_true() -> bool {
    true
}
fn d_20() -> u32 {
    20
}
fn d_10() -> usize {
    10
}
fn d_8000() -> usize {
    8000
}
fn d_body_bytes() -> usize {
    256 * 1024
}
fn d_60() -> u64 {
    60
}
fn d_64() -> usize {
    64
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:*".into(),
        "http://127.0.0.1:*".into(),
    ]
}
fn d_presets() -> BTreeMap<String, PresetConfig> {
    let preset = |t: f64| PresetConfig {
        temperature: Some(t),
        max_output_tokens: None,
    };
    BTreeMap::from([
        ("balanced".to_string(), preset(0.7)),
        ("precise".to_string(), preset(0.2)),
        ("creative".to_string(), preset(1.0)),
    ])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_config_empty_toml_uses_all_defaults() {
        let cfg: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 8787);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.path, "/api/generate");
        assert_eq!(cfg.max_contents, 10);
        assert_eq!(cfg.max_part_chars, 8000);
        assert_eq!(cfg.auth.env.as_deref(), Some("GEMINI_API_KEY"));
        assert_eq!(cfg.rate_limit, RateLimitConfig::default());
        assert!(cfg.presets.contains_key("balanced"));
        assert!(!cfg.debug);
    }

    #[test]
    fn rate_limit_overrides() {
        let toml_str = r#"
            [rate_limit]
            max_requests = 5
            window_secs = 10
        "#;
        let cfg: RelayConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.max_requests, 5);
        assert_eq!(cfg.rate_limit.window_secs, 10);
    }

    #[test]
    fn rate_limit_can_be_disabled() {
        let toml_str = r#"
            [rate_limit]
            enabled = false
        "#;
        let cfg: RelayConfig = toml::from_str(toml_str).unwrap();
        assert!(!cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.max_requests, 20);
    }

    #[test]
    fn custom_preset_parses() {
        let toml_str = r#"
            [presets.terse]
            temperature = 0.1
            max_output_tokens = 256
        "#;
        let cfg: RelayConfig = toml::from_str(toml_str).unwrap();
        let terse = &cfg.presets["terse"];
        assert_eq!(terse.max_output_tokens, Some(256));
        // Explicit presets replace the built-in table.
        assert!(!cfg.presets.contains_key("balanced"));
    }

    #[test]
    fn auth_keychain_fields_parse() {
        let toml_str = r#"
            [auth]
            service = "relaychat"
            account = "gemini-api-key"
        "#;
        let cfg: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.auth.service.as_deref(), Some("relaychat"));
        assert_eq!(cfg.auth.account.as_deref(), Some("gemini-api-key"));
        assert_eq!(cfg.auth.env.as_deref(), Some("GEMINI_API_KEY"));
    }
}
