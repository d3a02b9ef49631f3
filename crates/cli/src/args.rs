use clap::{Parser, Subcommand};

/// relaychat: chat with a model through a relay, falling back across model
/// tiers when one is busy.
#[derive(Debug, Parser)]
#[command(name = "relaychat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (default when no subcommand is given).
    Chat {
        /// Start on this tier (index, id, or alias).
        #[arg(long)]
        model: Option<String>,
    },
    /// Send one message and print the reply.
    Send {
        /// The message to send.
        message: String,
        /// Start on this tier (index, id, or alias).
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the saved transcript.
    History,
    /// Forget the saved transcript.
    Clear,
    /// List the model tiers in fallback order.
    Models,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Print the resolved `[client]` section as TOML.
    Show,
}
