use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tier::{default_tiers, ModelTier};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Full URL of the relay endpoint.
    #[serde(default = "d_relay_url")]
    pub relay_url: String,
    /// Named generation preset forwarded in `metadata.preset`.
    #[serde(default = "d_preset")]
    pub preset: String,
    /// Index into `tiers` selected at session start.
    #[serde(default = "d_1")]
    pub default_tier: usize,
    /// Pause between a capacity failure and the next tier's attempt.
    #[serde(default = "d_600")]
    pub backoff_ms: u64,
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
    /// Most recent turns sent per request.  Must not exceed the relay's
    /// `max_contents` or every long conversation is rejected.
    #[serde(default = "d_10")]
    pub max_contents: usize,
    /// Show raw relay/upstream error text instead of a generic message.
    #[serde(default)]
    pub debug: bool,
    /// Directory holding the persisted transcript.  Defaults to the
    /// platform data dir (`~/.local/share/relaychat` on Linux).
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default = "d_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Fallback order, highest capability first.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<ModelTier>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: d_relay_url(),
            preset: d_preset(),
            default_tier: 1,
            backoff_ms: 600,
            request_timeout_secs: 120,
            max_contents: 10,
            debug: false,
            state_dir: None,
            storage_key: d_storage_key(),
            history: HistoryConfig::default(),
            tiers: default_tiers(),
        }
    }
}

/// Caps applied to the persisted transcript on every save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "d_16")]
    pub max_messages: usize,
    #[serde(default = "d_8000")]
    pub max_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 16,
            max_chars: 8000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_relay_url() -> String {
    "http://127.0.0.1:8787/api/generate".into()
}
fn d_preset() -> String {
    "balanced".into()
}
fn d_storage_key() -> String {
    "chat_history".into()
}
fn d_1() -> usize {
    1
}
fn d_10() -> usize {
    10
}
fn d_16() -> usize {
    16
}
fn d_600() -> u64 {
    600
}
fn d_120() -> u64 {
    120
}
fn d_8000() -> usize {
    8000
}
