//! `pubsub`: command-line client.
//!
//! Usage:
//!   pubsub time
//!   pubsub publish ch1 '{"msg":"hello"}'
//!   pubsub history ch1 --limit 10
//!   pubsub subscribe ch1 ch2
//!
//! Env vars:
//!   PS_CONFIG          config file path (default: "pubsub.toml")
//!   PS_PUBLISH_KEY, PS_SUBSCRIBE_KEY, PS_SECRET_KEY, PS_CIPHER_KEY, PS_SSL
//!   RUST_LOG           overrides `logging.filter`

mod cli;
mod commands;

use clap::Parser;
use ps_domain::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::load_config(&cli.config)?;
    init_tracing(&config.logging);

    match cli.command {
        Command::Time => commands::time(&config).await,
        Command::Publish { channel, message } => {
            commands::publish(&config, &channel, message).await
        }
        Command::History { channel, limit } => commands::history(&config, &channel, limit).await,
        Command::Subscribe { channels } => commands::subscribe(&config, &channels).await,
        Command::Uuid => {
            commands::uuid();
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            if !commands::validate(&config, &cli.config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => commands::show(&config),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
