mod client;
mod logging;
mod reconnect;

pub use client::*;
pub use logging::*;
pub use reconnect::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults for missing keys.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        if !std::path::Path::new(path).exists() {
            tracing::debug!(path = %path, "config file not found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Overlay `PS_*` environment variables onto the loaded file values.
    ///
    /// | Variable           | Field                 |
    /// |--------------------|-----------------------|
    /// | `PS_PUBLISH_KEY`   | `client.publish_key`  |
    /// | `PS_SUBSCRIBE_KEY` | `client.subscribe_key`|
    /// | `PS_SECRET_KEY`    | `client.secret_key`   |
    /// | `PS_CIPHER_KEY`    | `client.cipher_key`   |
    /// | `PS_SSL`           | `client.ssl`          |
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PS_PUBLISH_KEY") {
            self.client.publish_key = v;
        }
        if let Some(v) = lookup("PS_SUBSCRIBE_KEY") {
            self.client.subscribe_key = v;
        }
        if let Some(v) = lookup("PS_SECRET_KEY") {
            self.client.secret_key = non_empty(v);
        }
        if let Some(v) = lookup("PS_CIPHER_KEY") {
            self.client.cipher_key = non_empty(v);
        }
        if let Some(v) = lookup("PS_SSL") {
            self.client.ssl = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.client.validate();

        if self.reconnect.backoff_factor < 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "reconnect.backoff_factor".into(),
                message: "backoff_factor must be >= 1.0".into(),
            });
        }

        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "reconnect.max_delay_ms".into(),
                message: "max_delay_ms is below initial_delay_ms; delays will be capped".into(),
            });
        }

        errors
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
