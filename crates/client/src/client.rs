//! The client handle: one-shot operations and subscription control.

use std::sync::Arc;
use std::time::Duration;

use ps_domain::config::ClientConfig;
use ps_domain::error::{Error, Result};
use ps_protocol::{
    decode_history, decode_publish, decode_time, encode_segment, request_headers, ClientEvent,
    ErrorInfo, ErrorKind, PublishResult, Request,
};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::callback::Dispatcher;
use crate::crypto::{self, Cipher};
use crate::reconnect::ReconnectBackoff;
use crate::registry::{ChannelRegistry, SubscribeOutcome};
use crate::subscribe::ChannelWorker;
use crate::transport::{HttpRequest, Transport};

/// State shared between the handle and every channel worker.
pub(crate) struct ClientInner {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) registry: ChannelRegistry,
    pub(crate) cipher: Option<Cipher>,
    pub(crate) backoff: ReconnectBackoff,
    origin: String,
    headers: Vec<(String, String)>,
}

impl ClientInner {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        dispatcher: Dispatcher,
        backoff: ReconnectBackoff,
    ) -> Self {
        let cipher = config.cipher().map(Cipher::new);
        Self {
            origin: config.origin_url(),
            headers: request_headers(&config.user_agent),
            config,
            transport,
            dispatcher,
            registry: ChannelRegistry::new(),
            cipher,
            backoff,
        }
    }

    /// Encode `request` for the wire. Fails only on segment encoding.
    pub(crate) fn http_request(
        &self,
        request: &Request,
        timeout: Option<Duration>,
    ) -> Result<HttpRequest> {
        Ok(HttpRequest {
            operation: request.operation,
            channel: request.channel.clone(),
            url: request.url(&self.origin)?,
            headers: self.headers.clone(),
            timeout,
        })
    }

    /// Perform a one-shot request under the configured timeout.
    async fn execute(&self, request: &Request) -> Result<Vec<u8>> {
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let http = self.http_request(request, Some(timeout))?;
        self.transport.perform_request(&http).await
    }

    /// Server time, or `0` when the service cannot be reached.
    pub(crate) async fn time(&self) -> u64 {
        match self.execute(&Request::time()).await {
            Ok(body) => decode_time(&body),
            Err(e) => {
                tracing::debug!(error = %e, "time request failed");
                0
            }
        }
    }

    pub(crate) fn report(&self, channel: &str, kind: ErrorKind, message: impl Into<String>) {
        self.dispatcher.emit(ClientEvent::Error {
            channel: channel.to_owned(),
            error: ErrorInfo::new(kind, message),
        });
    }
}

/// Handle to a publish/subscribe client.
///
/// Cheap to clone; clones share configuration, transport, callback and
/// channel registry. Create one with [`PubSubClient::builder`].
#[derive(Clone)]
pub struct PubSubClient {
    inner: Arc<ClientInner>,
}

impl PubSubClient {
    pub fn builder() -> crate::builder::PubSubClientBuilder {
        crate::builder::PubSubClientBuilder::new()
    }

    pub(crate) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.inner.registry
    }

    /// A fresh random client identifier (32 lowercase hex characters).
    pub fn uuid() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    // ── One-shot operations ──────────────────────────────────────────

    /// Publish `message` to `channel`.
    ///
    /// Always yields a result, which is also delivered to
    /// [`Callback::on_publish`](crate::Callback::on_publish). Failures
    /// before the request is sent (encoding, encryption) are additionally
    /// reported through `on_error`.
    pub async fn publish(&self, channel: &str, message: impl Into<Value>) -> PublishResult {
        let message = message.into();
        let result = match self.prepare_publish(channel, &message) {
            Ok(request) => match self.inner.execute(&request).await {
                Ok(body) => decode_publish(&body),
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "publish request failed");
                    PublishResult::failure(e)
                }
            },
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "publish aborted");
                self.inner.report(channel, error_kind(&e), e.to_string());
                PublishResult::failure(e)
            }
        };

        self.inner.dispatcher.emit(ClientEvent::Publish {
            channel: channel.to_owned(),
            result: result.clone(),
        });
        result
    }

    fn prepare_publish(&self, channel: &str, message: &Value) -> Result<Request> {
        let payload = match &self.inner.cipher {
            Some(cipher) => cipher.encrypt(message)?,
            None => message.clone(),
        };
        let serialized = serde_json::to_string(&payload)?;
        let cfg = &self.inner.config;
        let signature = crypto::sign(
            cfg.secret(),
            &cfg.publish_key,
            &cfg.subscribe_key,
            channel,
            &serialized,
        )?;
        let request = Request::publish(
            &cfg.publish_key,
            &cfg.subscribe_key,
            &signature,
            channel,
            &serialized,
        );
        // Surface encoding problems here rather than inside the transport.
        request.url(&self.inner.origin)?;
        Ok(request)
    }

    /// Fetch up to `limit` stored messages for `channel`, oldest first.
    ///
    /// With a cipher configured, each record is decrypted on its own; a
    /// record that fails is reported through `on_error` and left out.
    pub async fn history(&self, channel: &str, limit: u32) -> Result<Vec<Value>> {
        let request = Request::history(&self.inner.config.subscribe_key, channel, limit);
        let records = match self.fetch_history(&request).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "history failed");
                self.inner.report(channel, error_kind(&e), e.to_string());
                return Err(e);
            }
        };

        let records = match &self.inner.cipher {
            Some(cipher) => records
                .into_iter()
                .enumerate()
                .filter_map(|(index, record)| match cipher.decrypt(&record) {
                    Ok(plain) => Some(plain),
                    Err(e) => {
                        tracing::warn!(channel = %channel, index, error = %e, "failed to decrypt history record");
                        self.inner.report(channel, ErrorKind::Crypto, e.to_string());
                        None
                    }
                })
                .collect(),
            None => records,
        };

        self.inner.dispatcher.emit(ClientEvent::History {
            channel: channel.to_owned(),
            records: records.clone(),
        });
        Ok(records)
    }

    async fn fetch_history(&self, request: &Request) -> Result<Vec<Value>> {
        let body = self.inner.execute(request).await?;
        decode_history(&body)
    }

    /// [`history`](Self::history) with the configured default limit.
    pub async fn history_default(&self, channel: &str) -> Result<Vec<Value>> {
        self.history(channel, self.inner.config.history_limit).await
    }

    /// Server time as a timetoken; `0` when the service is unreachable.
    pub async fn time(&self) -> u64 {
        self.inner.time().await
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Start receiving messages for `channel`.
    ///
    /// Returns the worker's handle when a new worker was started. `None`
    /// means the channel was already live (reported as an
    /// `already_connected` error), an existing worker picked the
    /// subscription back up, or the channel name cannot be encoded.
    ///
    /// Workers run on the ambient Tokio runtime. Called outside one, this
    /// reports a `no_runtime` error and leaves the channel unsubscribed.
    pub fn subscribe(&self, channel: &str) -> Option<JoinHandle<()>> {
        if let Err(e) = encode_segment(channel) {
            self.inner.report(channel, ErrorKind::Encoding, e.to_string());
            return None;
        }

        match self.inner.registry.subscribe(channel) {
            SubscribeOutcome::Spawn => {
                let runtime = match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        self.inner.registry.stop(channel);
                        tracing::error!(channel = %channel, error = %e, "no runtime to run the channel worker");
                        self.inner.report(channel, ErrorKind::NoRuntime, e.to_string());
                        return None;
                    }
                };
                tracing::info!(channel = %channel, "subscribing");
                let worker = ChannelWorker::new(self.inner.clone(), channel);
                Some(runtime.spawn(worker.run()))
            }
            SubscribeOutcome::Reactivated => {
                tracing::debug!(channel = %channel, "resubscribed on running worker");
                None
            }
            SubscribeOutcome::AlreadyConnected => {
                self.inner
                    .report(channel, ErrorKind::AlreadyConnected, "Already Connected.");
                None
            }
        }
    }

    /// Stop receiving messages for `channel` once its in-flight poll
    /// returns. Returns `false` if the channel was not live.
    pub fn unsubscribe(&self, channel: &str) -> bool {
        let stopped = self.inner.registry.unsubscribe(channel);
        if stopped {
            tracing::info!(channel = %channel, "unsubscribing");
        }
        stopped
    }

    /// Unsubscribe from every live channel.
    pub fn unsubscribe_all(&self) {
        for channel in self.inner.registry.channels() {
            self.unsubscribe(&channel);
        }
    }
}

fn error_kind(e: &Error) -> ErrorKind {
    match e {
        Error::Encoding(_) => ErrorKind::Encoding,
        Error::Crypto(_) => ErrorKind::Crypto,
        Error::Json(_) | Error::Decode(_) => ErrorKind::Decode,
        _ => ErrorKind::Transport,
    }
}
