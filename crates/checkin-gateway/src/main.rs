use clap::Parser;
use tracing::info;

mod app;
mod auth;
mod cli;
mod commands;
mod delivery;
mod http;
mod services;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "checkin_gateway=info,checkin_engine=info,checkin_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > CHECKIN_CONFIG env > ~/.checkin/checkin.toml
    let config_path = cli.config_path();
    let config = checkin_core::config::CheckinConfig::load(config_path.as_deref())?;
    info!(namespace = %config.scheduler.namespace, "configuration loaded");

    match cli.command {
        None | Some(Commands::Serve) => commands::serve::execute(config).await,
        Some(Commands::CheckIn(args)) => commands::check_in::execute(args, &config).await,
        Some(Commands::Windows(args)) => commands::windows::execute(args, &config).await,
    }
}
