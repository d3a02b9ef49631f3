use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;

use rc_domain::config::Config;
use rc_relay::api;
use rc_relay::cli::{Cli, Command, ConfigCommand};
use rc_relay::state::AppState;
use rc_relay::telemetry::Telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let (config, config_path) = rc_relay::cli::load_config()?;
            let telemetry = Telemetry::init(&config.observability);
            let served = run_server(config, config_path).await;
            telemetry.shutdown();
            served
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = rc_relay::cli::load_config()?;
            if !rc_relay::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _) = rc_relay::cli::load_config()?;
            rc_relay::cli::config::show(&config)
        }
        Some(Command::Config(ConfigCommand::SetSecret)) => {
            Telemetry::init_cli();
            let (config, _) = rc_relay::cli::load_config()?;
            rc_relay::cli::config::set_secret(&config)
        }
    }
}

async fn run_server(config: Config, config_path: String) -> anyhow::Result<()> {
    tracing::info!(config = %config_path, "relaychat-relay starting");

    for issue in config.validate() {
        tracing::warn!(field = %issue.field, "{issue}");
    }

    let relay = config.relay.clone();
    let state = AppState::from_config(relay.clone()).context("building relay state")?;
    match &state.limiter {
        Some(_) => tracing::info!(
            max_requests = relay.rate_limit.max_requests,
            window_secs = relay.rate_limit.window_secs,
            "per-source rate limiting enabled"
        ),
        None => tracing::info!("per-source rate limiting disabled"),
    }
    let app = api::router(state);

    let addr = format!("{}:{}", relay.host, relay.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, path = %relay.path, "relaychat-relay listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable; Ctrl+C only");
                    let _ = ctrl_c.await;
                    return;
                }
            };

        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
