//! Builder pattern for constructing a [`PubSubClient`].

use std::sync::Arc;

use ps_domain::config::{ClientConfig, Config, ConfigSeverity};
use ps_domain::error::{Error, Result};

use crate::callback::{Callback, Dispatcher, LogCallback};
use crate::client::{ClientInner, PubSubClient};
use crate::reconnect::ReconnectBackoff;
use crate::transport::{HttpTransport, Transport};

/// Fluent builder for [`PubSubClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use ps_client::PubSubClientBuilder;
/// let (callback, _events) = ps_client::event_channel();
/// let client = PubSubClientBuilder::new()
///     .publish_key("demo")
///     .subscribe_key("demo")
///     .cipher_key("enigma")
///     .ssl(true)
///     .callback(callback)
///     .build()
///     .unwrap();
/// ```
pub struct PubSubClientBuilder {
    config: ClientConfig,
    reconnect_backoff: ReconnectBackoff,
    transport: Option<Arc<dyn Transport>>,
    callback: Option<Arc<dyn Callback>>,
}

impl PubSubClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            reconnect_backoff: ReconnectBackoff::default(),
            transport: None,
            callback: None,
        }
    }

    /// Start from a loaded [`Config`]: client keys plus reconnect policy.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .config(config.client.clone())
            .reconnect_backoff(ReconnectBackoff::from(&config.reconnect))
    }

    // ── Keys / origin ────────────────────────────────────────────────

    /// Replace every connection setting at once.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn publish_key(mut self, key: impl Into<String>) -> Self {
        self.config.publish_key = key.into();
        self
    }

    pub fn subscribe_key(mut self, key: impl Into<String>) -> Self {
        self.config.subscribe_key = key.into();
        self
    }

    /// Sign publish requests with this secret.
    pub fn secret_key(mut self, key: impl Into<String>) -> Self {
        self.config.secret_key = Some(key.into());
        self
    }

    /// Encrypt payloads with a key derived from this string.
    pub fn cipher_key(mut self, key: impl Into<String>) -> Self {
        self.config.cipher_key = Some(key.into());
        self
    }

    pub fn ssl(mut self, enabled: bool) -> Self {
        self.config.ssl = enabled;
        self
    }

    /// Service host (e.g. `pubsub.pubnub.com` or `127.0.0.1:8080`).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = origin.into();
        self
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Override the reconnect policy (default: every 5s, forever).
    pub fn reconnect_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Where events go. Without one, events are only logged.
    pub fn callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Replace the HTTP stack (tests, proxies, custom TLS).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the [`PubSubClient`].
    pub fn build(self) -> Result<PubSubClient> {
        let problems = self.config.validate();
        for p in problems.iter().filter(|p| p.severity == ConfigSeverity::Warning) {
            tracing::warn!(field = %p.field, "{}", p.message);
        }
        if let Some(p) = problems.iter().find(|p| p.severity == ConfigSeverity::Error) {
            return Err(Error::Config(p.to_string()));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        let callback = self.callback.unwrap_or_else(|| Arc::new(LogCallback));

        tracing::debug!(
            origin = %self.config.origin_url(),
            signed = self.config.secret().is_some(),
            encrypted = self.config.cipher().is_some(),
            "client built"
        );

        Ok(PubSubClient::from_inner(ClientInner::new(
            Arc::new(self.config),
            transport,
            Dispatcher::new(callback),
            self.reconnect_backoff,
        )))
    }
}

impl Default for PubSubClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subscribe_key_rejected() {
        let err = PubSubClientBuilder::new().subscribe_key("").build().err();
        assert!(matches!(err, Some(Error::Config(msg)) if msg.contains("subscribe_key")));
    }

    #[test]
    fn builds_with_defaults() {
        let client = PubSubClientBuilder::new().build().unwrap();
        assert_eq!(client.config().origin_url(), "http://pubsub.pubnub.com");
        assert!(client.registry().channels().is_empty());
    }

    #[test]
    fn setters_land_in_config() {
        let client = PubSubClientBuilder::new()
            .publish_key("pk")
            .subscribe_key("sk")
            .secret_key("s")
            .cipher_key("c")
            .ssl(true)
            .origin("example.test")
            .build()
            .unwrap();
        let cfg = client.config();
        assert_eq!(cfg.publish_key, "pk");
        assert_eq!(cfg.subscribe_key, "sk");
        assert_eq!(cfg.secret(), Some("s"));
        assert_eq!(cfg.cipher(), Some("c"));
        assert_eq!(cfg.origin_url(), "https://example.test");
    }

    #[test]
    fn subscribe_outside_runtime_reports_and_rolls_back() {
        let (callback, mut events) = crate::event_channel();
        let client = PubSubClientBuilder::new().callback(callback).build().unwrap();

        assert!(client.subscribe("ch1").is_none());
        assert!(!client.registry().is_connected("ch1"));
        match events.try_recv() {
            Ok(crate::ClientEvent::Error { channel, error }) => {
                assert_eq!(channel, "ch1");
                assert_eq!(error.kind, crate::ErrorKind::NoRuntime);
            }
            other => panic!("expected no_runtime error, got {other:?}"),
        }

        // The failed attempt must not leave the channel half-subscribed.
        assert!(client.subscribe("ch1").is_none());
        assert!(matches!(
            events.try_recv(),
            Ok(crate::ClientEvent::Error { error, .. }) if error.kind == crate::ErrorKind::NoRuntime
        ));
    }

    #[test]
    fn uuid_is_32_hex_chars() {
        let id = PubSubClient::uuid();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, PubSubClient::uuid());
    }
}
