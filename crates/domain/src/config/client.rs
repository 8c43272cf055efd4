use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigSeverity};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keys and origin for one client instance.
///
/// Read-only once a client has been built from it; the client keeps it
/// behind an `Arc` and never hands out a mutable reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "d_demo")]
    pub publish_key: String,
    #[serde(default = "d_demo")]
    pub subscribe_key: String,
    /// When set, publish requests carry an HMAC-SHA256 signature.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// When set, payloads are encrypted before publish and decrypted on receipt.
    #[serde(default)]
    pub cipher_key: Option<String>,
    #[serde(default)]
    pub ssl: bool,
    /// Bare host name; the scheme is derived from `ssl`.
    #[serde(default = "d_origin")]
    pub origin: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// Timeout for publish/history/time. Subscribe long-polls are never
    /// timed out by the client.
    #[serde(default = "d_15000")]
    pub request_timeout_ms: u64,
    #[serde(default = "d_100")]
    pub history_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            publish_key: d_demo(),
            subscribe_key: d_demo(),
            secret_key: None,
            cipher_key: None,
            ssl: false,
            origin: d_origin(),
            user_agent: d_user_agent(),
            request_timeout_ms: 15_000,
            history_limit: 100,
        }
    }
}

impl ClientConfig {
    /// Scheme + host, e.g. `https://pubsub.pubnub.com`.
    pub fn origin_url(&self) -> String {
        let host = self
            .origin
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{host}")
    }

    /// Secret key, treating an empty string as absent.
    pub fn secret(&self) -> Option<&str> {
        self.secret_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Cipher key, treating an empty string as absent.
    pub fn cipher(&self) -> Option<&str> {
        self.cipher_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.subscribe_key.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "client.subscribe_key".into(),
                message: "subscribe_key must not be empty".into(),
            });
        }

        if self.origin.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "client.origin".into(),
                message: "origin must not be empty".into(),
            });
        }

        if self.publish_key.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "client.publish_key".into(),
                message: "publish_key is empty; publish requests will be rejected".into(),
            });
        }

        errors
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_demo() -> String {
    "demo".into()
}
fn d_origin() -> String {
    "pubsub.pubnub.com".into()
}
fn d_user_agent() -> String {
    format!("ps-client/{}", env!("CARGO_PKG_VERSION"))
}
fn d_15000() -> u64 {
    15_000
}
fn d_100() -> u32 {
    100
}
