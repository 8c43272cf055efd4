//! Events delivered to application code.

use serde::Serialize;
use serde_json::Value;

use crate::envelope::PublishResult;

/// Everything the client can tell an application, as one tagged type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// First healthy poll since the channel became active.
    Connected { channel: String },
    /// The channel stopped polling, or its poll was dropped.
    Disconnected { channel: String },
    /// A liveness probe failed while re-establishing the channel.
    Reconnecting { channel: String },
    /// One decoded (and decrypted) message, in delivery order.
    Message { channel: String, message: Value },
    History { channel: String, records: Vec<Value> },
    Publish { channel: String, result: PublishResult },
    Error { channel: String, error: ErrorInfo },
}

impl ClientEvent {
    pub fn channel(&self) -> &str {
        match self {
            ClientEvent::Connected { channel }
            | ClientEvent::Disconnected { channel }
            | ClientEvent::Reconnecting { channel }
            | ClientEvent::Message { channel, .. }
            | ClientEvent::History { channel, .. }
            | ClientEvent::Publish { channel, .. }
            | ClientEvent::Error { channel, .. } => channel,
        }
    }
}

/// Category of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A URL segment could not be encoded; the operation was aborted.
    Encoding,
    /// Connection refused, timeout, or a non-OK status.
    Transport,
    /// The service answered with something that is not the expected JSON.
    Decode,
    /// One message or record could not be decrypted.
    Crypto,
    /// `subscribe` was called for a channel that is already live.
    AlreadyConnected,
    /// The reconnect policy ran out of attempts.
    ReconnectExhausted,
    /// `subscribe` was called outside a Tokio runtime; no worker started.
    NoRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
