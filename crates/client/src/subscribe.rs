//! Per-channel long-poll worker.
//!
//! One task per live channel, looping:
//!
//! ```text
//!   ┌──────────► keep_polling? ── no ──► Disconnected, STOPPED
//!   │                 │ yes
//!   │          subscribe/{sub}/{ch}/0/{tt}   (no timeout)
//!   │                 │
//!   │          keep_polling? ── no ──► Disconnected, STOPPED
//!   │                 │ yes
//!   │          decode envelope
//!   │           │              │
//!   │         live           dropped ──► Disconnected, probe time/0
//!   │           │                           until it answers, then
//!   │   connect once,                       resume with the previous
//!   │   dispatch messages,                  cursor (or server time)
//!   │   advance cursor                           │
//!   └───────────┴────────────────────────────────┘
//! ```
//!
//! The next poll is only issued after the previous response has been fully
//! dispatched, so at most one request per channel is ever in flight.

use std::sync::Arc;

use ps_domain::error::Error;
use ps_domain::trace::TraceEvent;
use ps_protocol::{
    decode_subscribe, ClientEvent, Envelope, ErrorKind, Request, SubscribeResponse, TIMETOKEN_NOW,
};

use crate::client::ClientInner;

pub(crate) struct ChannelWorker {
    inner: Arc<ClientInner>,
    channel: String,
}

impl ChannelWorker {
    pub(crate) fn new(inner: Arc<ClientInner>, channel: impl Into<String>) -> Self {
        Self {
            inner,
            channel: channel.into(),
        }
    }

    pub(crate) async fn run(self) {
        let mut timetoken = TIMETOKEN_NOW.to_owned();
        tracing::debug!(channel = %self.channel, "channel worker started");

        loop {
            if !self.inner.registry.keep_polling(&self.channel) {
                if self.exit("unsubscribed", true) {
                    return;
                }
                continue;
            }

            let body = match self.poll(&timetoken).await {
                Ok(body) => Some(body),
                Err(Error::Encoding(e)) => {
                    self.inner.report(&self.channel, ErrorKind::Encoding, e);
                    self.emit_disconnected();
                    self.inner.registry.stop(&self.channel);
                    self.trace_stopped("encoding error");
                    return;
                }
                Err(e) => {
                    tracing::debug!(channel = %self.channel, error = %e, "subscribe request failed");
                    None
                }
            };

            // The response is discarded; a resubscribe re-polls the same cursor.
            if !self.inner.registry.keep_polling(&self.channel) {
                if self.exit("unsubscribed", true) {
                    return;
                }
                continue;
            }

            match decode_subscribe(body.as_deref()) {
                SubscribeResponse::Live(envelope) => self.deliver(envelope, &mut timetoken),
                SubscribeResponse::Dropped(reason) => {
                    tracing::warn!(
                        channel = %self.channel,
                        timetoken = %timetoken,
                        reason = %reason,
                        "subscription dropped"
                    );
                    self.inner.registry.mark_dropped(&self.channel);
                    TraceEvent::ChannelDropped {
                        channel: self.channel.clone(),
                        timetoken: timetoken.clone(),
                        reason: reason.to_string(),
                    }
                    .emit();
                    self.emit_disconnected();

                    match self.reconnect(&timetoken).await {
                        Some(resume_from) => timetoken = resume_from,
                        None => return,
                    }
                }
            }
        }
    }

    async fn poll(&self, timetoken: &str) -> ps_domain::error::Result<Vec<u8>> {
        let request = Request::subscribe(&self.inner.config.subscribe_key, &self.channel, timetoken);
        let http = self.inner.http_request(&request, None)?;
        tracing::trace!(channel = %self.channel, timetoken = %timetoken, "long-poll issued");
        self.inner.transport.perform_request(&http).await
    }

    /// Healthy response: connect once, dispatch in order, advance the cursor.
    fn deliver(&self, envelope: Envelope, timetoken: &mut String) {
        if self.inner.registry.mark_first_message(&self.channel) {
            tracing::info!(channel = %self.channel, "channel connected");
            TraceEvent::ChannelConnected {
                channel: self.channel.clone(),
            }
            .emit();
            self.inner.dispatcher.emit(ClientEvent::Connected {
                channel: self.channel.clone(),
            });
        }

        for (index, message) in envelope.messages.into_iter().enumerate() {
            let message = match &self.inner.cipher {
                Some(cipher) => match cipher.decrypt(&message) {
                    Ok(plain) => plain,
                    Err(e) => {
                        tracing::warn!(channel = %self.channel, index, error = %e, "failed to decrypt message");
                        TraceEvent::MessageDecryptFailed {
                            channel: self.channel.clone(),
                            index,
                        }
                        .emit();
                        self.inner.report(&self.channel, ErrorKind::Crypto, e.to_string());
                        continue;
                    }
                },
                None => message,
            };
            self.inner.dispatcher.emit(ClientEvent::Message {
                channel: self.channel.clone(),
                message,
            });
        }

        if !envelope.timetoken.is_empty() {
            *timetoken = envelope.timetoken;
            self.inner.registry.set_timetoken(&self.channel, timetoken);
        }
    }

    /// Probe the time endpoint until the service answers.
    ///
    /// Returns the cursor to resume from, or `None` if the worker must stop
    /// (caller unsubscribed, or the reconnect policy gave up).
    async fn reconnect(&self, last_timetoken: &str) -> Option<String> {
        let backoff = &self.inner.backoff;
        let mut failures: u32 = 0;

        loop {
            if !self.inner.registry.keep_polling(&self.channel)
                && self.exit("unsubscribed while reconnecting", false)
            {
                return None;
            }

            let server_time = self.inner.time().await;
            if server_time != 0 {
                let resume_from = if last_timetoken != TIMETOKEN_NOW {
                    last_timetoken.to_owned()
                } else {
                    server_time.to_string()
                };
                if !self.inner.registry.resume(&self.channel, &resume_from) {
                    // Unsubscribed while the time request was in flight.
                    if self.exit("unsubscribed while reconnecting", false) {
                        return None;
                    }
                    continue;
                }
                tracing::info!(channel = %self.channel, timetoken = %resume_from, "channel resumed");
                TraceEvent::ChannelResumed {
                    channel: self.channel.clone(),
                    timetoken: resume_from.clone(),
                    attempts: failures + 1,
                }
                .emit();
                return Some(resume_from);
            }

            self.inner.dispatcher.emit(ClientEvent::Reconnecting {
                channel: self.channel.clone(),
            });

            failures += 1;
            if backoff.should_give_up(failures) {
                tracing::error!(channel = %self.channel, attempts = failures, "reconnect attempts exhausted");
                self.inner.report(
                    &self.channel,
                    ErrorKind::ReconnectExhausted,
                    format!("service unreachable after {failures} attempts"),
                );
                self.inner.registry.stop(&self.channel);
                self.trace_stopped("reconnect exhausted");
                return None;
            }

            let delay = backoff.delay_for_attempt(failures - 1);
            TraceEvent::ReconnectProbe {
                channel: self.channel.clone(),
                attempt: failures,
                delay_ms: delay.as_millis() as u64,
            }
            .emit();
            tokio::time::sleep(delay).await;
        }
    }

    fn emit_disconnected(&self) {
        self.inner.dispatcher.emit(ClientEvent::Disconnected {
            channel: self.channel.clone(),
        });
    }

    /// Leave the loop after `keep_polling` said no.
    ///
    /// The disconnect goes out before the registry marks the channel
    /// stopped, so a worker spawned by a later `subscribe` always connects
    /// after it. Returns `false` if the channel was subscribed again in
    /// between and this worker must carry on.
    fn exit(&self, reason: &str, notify: bool) -> bool {
        if notify {
            self.emit_disconnected();
        }
        if self.inner.registry.finish(&self.channel) {
            self.trace_stopped(reason);
            true
        } else {
            tracing::debug!(channel = %self.channel, "resubscribed before exit, worker continues");
            false
        }
    }

    fn trace_stopped(&self, reason: &str) {
        tracing::info!(channel = %self.channel, reason, "channel worker stopped");
        TraceEvent::ChannelStopped {
            channel: self.channel.clone(),
            reason: reason.to_owned(),
        }
        .emit();
    }
}
