//! Wiring a [`ChatSession`] from the client config.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use rc_dispatch::{CascadeEvent, ChatSession, HttpRelayClient, SessionOptions};
use rc_domain::config::{ClientConfig, Config};
use rc_domain::tier::find_tier;
use rc_transcript::{FileKvStore, TranscriptStore};

/// Load the configuration from `RC_CONFIG` (or `relaychat.toml`).  Returns
/// the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let path = Config::default_path();
    let config = Config::load(Path::new(&path)).with_context(|| format!("loading {path}"))?;
    Ok((config, path))
}

/// `client.state_dir`, or `<data dir>/relaychat`.
pub fn state_dir(cfg: &ClientConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &cfg.state_dir {
        return Ok(dir.clone());
    }
    dirs::data_dir()
        .map(|d| d.join("relaychat"))
        .context("no data directory on this platform; set client.state_dir")
}

pub fn open_transcript(cfg: &ClientConfig) -> anyhow::Result<Arc<TranscriptStore>> {
    let dir = state_dir(cfg)?;
    let kv = FileKvStore::open(&dir).with_context(|| format!("opening {}", dir.display()))?;
    Ok(Arc::new(TranscriptStore::new(
        Arc::new(kv),
        cfg.storage_key.clone(),
        cfg.history,
    )))
}

/// Build a session against the configured relay.  `model` picks the
/// starting tier by index, id, or alias.
pub fn build_session(
    cfg: &ClientConfig,
    model: Option<&str>,
    events: Option<mpsc::UnboundedSender<CascadeEvent>>,
) -> anyhow::Result<ChatSession> {
    let mut options = SessionOptions::from_config(cfg);
    if let Some(query) = model {
        options.default_tier = find_tier(&cfg.tiers, query)
            .with_context(|| format!("unknown model '{query}' (see `relaychat models`)"))?;
    }

    let relay = HttpRelayClient::new(
        cfg.relay_url.clone(),
        Duration::from_secs(cfg.request_timeout_secs),
    )?;
    let transcript = open_transcript(cfg)?;

    let session = ChatSession::new(Arc::new(relay), transcript, cfg.tiers.clone(), options)?;
    Ok(match events {
        Some(tx) => session.with_events(tx),
        None => session,
    })
}
