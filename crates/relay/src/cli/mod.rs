pub mod config;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use rc_domain::config::Config;

/// relaychat-relay: forwards chat requests to the model API without
/// exposing the API key to clients.
#[derive(Debug, Parser)]
#[command(name = "relaychat-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the relay (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Print the resolved `[relay]` and `[observability]` sections as TOML.
    Show,
    /// Store the upstream API key in the OS keychain under
    /// `relay.auth.service` / `relay.auth.account`.
    SetSecret,
}

/// Load the configuration from `RC_CONFIG` (or `relaychat.toml`).  Returns
/// the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let path = Config::default_path();
    let config = Config::load(Path::new(&path)).with_context(|| format!("loading {path}"))?;
    Ok((config, path))
}
