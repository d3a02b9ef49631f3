//! One-shot subcommands.

use anyhow::Context;
use serde::Serialize;

use rc_dispatch::CascadeOutcome;
use rc_domain::config::{ClientConfig, Config, ConfigSeverity};

use crate::context::{build_session, open_transcript};
use crate::render::{event_notice, history_text, models_text};

/// Send one message; fallback notices go to stderr as they happen.
pub async fn send(
    cfg: &ClientConfig,
    message: &str,
    model: Option<&str>,
) -> anyhow::Result<CascadeOutcome> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let session = build_session(cfg, model, Some(tx))?;

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(notice) = event_notice(&event) {
                eprintln!("{notice}");
            }
        }
    });

    let outcome = session.submit(message).await;
    drop(session);
    let _ = printer.await;
    Ok(outcome)
}

pub fn history(cfg: &ClientConfig) -> anyhow::Result<String> {
    Ok(history_text(&open_transcript(cfg)?.load()))
}

pub fn clear(cfg: &ClientConfig) -> anyhow::Result<()> {
    open_transcript(cfg)?
        .try_clear()
        .context("clearing transcript")
}

pub fn models(cfg: &ClientConfig) -> String {
    models_text(&cfg.tiers, cfg.default_tier)
}

/// Print every validation issue.  Returns `false` when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    for issue in &issues {
        println!("{issue}");
    }
    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count,
        issues.len() - error_count,
    );
    error_count == 0
}

#[derive(Serialize)]
struct ClientSection<'a> {
    client: &'a ClientConfig,
}

pub fn render_client_config(cfg: &ClientConfig) -> anyhow::Result<String> {
    toml::to_string_pretty(&ClientSection { client: cfg }).context("serializing config")
}
