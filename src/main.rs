use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analysis;
mod cli;
mod config;
mod data;

use cli::Cli;
use config::Config;

fn main() -> Result<()> {
    // Load configuration first
    let config = Config::load()?;

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "sentifuse starting up");

    cli::run(cli, &config)?;

    info!("sentifuse completed successfully");
    Ok(())
}
