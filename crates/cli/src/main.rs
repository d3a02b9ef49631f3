use clap::Parser;
use tracing_subscriber::EnvFilter;

use rc_cli::args::{Cli, Command, ConfigCommand};
use rc_cli::render::outcome_text;
use rc_cli::{chat, commands, context};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_cli_tracing();
    let cli = Cli::parse();
    let (config, config_path) = context::load_config()?;
    let client = &config.client;

    match cli.command.unwrap_or(Command::Chat { model: None }) {
        Command::Chat { model } => chat::chat(client, model.as_deref()).await,
        Command::Send { message, model } => {
            let outcome = commands::send(client, &message, model.as_deref()).await?;
            tracing::debug!(outcome = outcome.label(), "send finished");
            match outcome_text(&outcome) {
                Ok(reply) => {
                    println!("{reply}");
                    Ok(())
                }
                Err(notice) => {
                    eprintln!("{notice}");
                    std::process::exit(1);
                }
            }
        }
        Command::History => {
            print!("{}", commands::history(client)?);
            Ok(())
        }
        Command::Clear => {
            commands::clear(client)?;
            eprintln!("Transcript cleared.");
            Ok(())
        }
        Command::Models => {
            print!("{}", commands::models(client));
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            if !commands::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            print!("{}", commands::render_client_config(client)?);
            Ok(())
        }
    }
}

/// Warnings only; the terminal belongs to the conversation.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
