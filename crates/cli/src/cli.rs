use anyhow::Context;
use clap::{Parser, Subcommand};
use ps_domain::config::Config;

/// pubsub: command-line client for the publish/subscribe service.
#[derive(Debug, Parser)]
#[command(name = "pubsub", version, about)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "PS_CONFIG", default_value = "pubsub.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the service's current timetoken.
    Time,
    /// Publish one message. Parsed as JSON, or sent as a string otherwise.
    Publish {
        channel: String,
        message: String,
    },
    /// Print stored messages, one JSON value per line.
    History {
        channel: String,
        /// Number of records (defaults to `client.history_limit`).
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print events as JSON lines until Ctrl-C.
    Subscribe {
        #[arg(required = true)]
        channels: Vec<String>,
    },
    /// Print a fresh random client identifier.
    Uuid,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Check the config for errors and warnings.
    Validate,
    /// Print the resolved config with defaults filled in.
    Show,
}

/// Load `path` if present (defaults otherwise), then apply `PS_*` env overrides.
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut config = if std::path::Path::new(path).exists() {
        Config::load(path).with_context(|| format!("loading {path}"))?
    } else {
        Config::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
