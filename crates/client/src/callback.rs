//! Callback sink: how events reach application code.
//!
//! Implement [`Callback`] directly, or call [`event_channel`] to receive
//! every event as a [`ClientEvent`] on an unbounded queue.

use std::sync::Arc;

use ps_protocol::{ClientEvent, ErrorInfo, PublishResult};
use serde_json::Value;
use tokio::sync::mpsc;

/// Application handler for client events.
///
/// Every method is invoked synchronously on the task that produced the
/// event (a channel worker for subscribe traffic, the caller's task for
/// publish/history), so handlers should return quickly.
///
/// # Example
///
/// ```rust,no_run
/// use ps_client::Callback;
///
/// struct Printer;
///
/// impl Callback for Printer {
///     fn on_message(&self, channel: &str, message: serde_json::Value) -> bool {
///         println!("{channel}: {message}");
///         true
///     }
/// }
/// ```
pub trait Callback: Send + Sync + 'static {
    /// One decoded message. The return value is currently ignored.
    fn on_message(&self, channel: &str, message: Value) -> bool;

    fn on_error(&self, channel: &str, error: ErrorInfo) {
        tracing::warn!(channel = %channel, error = %error, "unhandled client error");
    }

    fn on_connect(&self, _channel: &str) {}

    fn on_reconnect(&self, _channel: &str) {}

    fn on_disconnect(&self, _channel: &str) {}

    fn on_history(&self, _channel: &str, _records: Vec<Value>) {}

    fn on_publish(&self, _channel: &str, _result: PublishResult) {}
}

/// Routes a [`ClientEvent`] to the matching [`Callback`] method.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    sink: Arc<dyn Callback>,
}

impl Dispatcher {
    pub(crate) fn new(sink: Arc<dyn Callback>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        match event {
            ClientEvent::Connected { channel } => self.sink.on_connect(&channel),
            ClientEvent::Disconnected { channel } => self.sink.on_disconnect(&channel),
            ClientEvent::Reconnecting { channel } => self.sink.on_reconnect(&channel),
            ClientEvent::Message { channel, message } => {
                // Reserved for future flow control; delivery continues either way.
                let _ = self.sink.on_message(&channel, message);
            }
            ClientEvent::History { channel, records } => self.sink.on_history(&channel, records),
            ClientEvent::Publish { channel, result } => self.sink.on_publish(&channel, result),
            ClientEvent::Error { channel, error } => self.sink.on_error(&channel, error),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Built-in sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Forwards every event into an unbounded queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl EventSender {
    fn send(&self, event: ClientEvent) -> bool {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped");
            return false;
        }
        true
    }
}

impl Callback for EventSender {
    fn on_message(&self, channel: &str, message: Value) -> bool {
        self.send(ClientEvent::Message {
            channel: channel.to_owned(),
            message,
        })
    }

    fn on_error(&self, channel: &str, error: ErrorInfo) {
        self.send(ClientEvent::Error {
            channel: channel.to_owned(),
            error,
        });
    }

    fn on_connect(&self, channel: &str) {
        self.send(ClientEvent::Connected {
            channel: channel.to_owned(),
        });
    }

    fn on_reconnect(&self, channel: &str) {
        self.send(ClientEvent::Reconnecting {
            channel: channel.to_owned(),
        });
    }

    fn on_disconnect(&self, channel: &str) {
        self.send(ClientEvent::Disconnected {
            channel: channel.to_owned(),
        });
    }

    fn on_history(&self, channel: &str, records: Vec<Value>) {
        self.send(ClientEvent::History {
            channel: channel.to_owned(),
            records,
        });
    }

    fn on_publish(&self, channel: &str, result: PublishResult) {
        self.send(ClientEvent::Publish {
            channel: channel.to_owned(),
            result,
        });
    }
}

/// A callback that queues events, plus the receiving end.
///
/// Per-channel ordering is preserved: each worker sends its events in the
/// order it produces them.
pub fn event_channel() -> (Arc<dyn Callback>, mpsc::UnboundedReceiver<ClientEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(EventSender { tx }), rx)
}

/// Default sink when none is configured: logs and drops.
pub(crate) struct LogCallback;

impl Callback for LogCallback {
    fn on_message(&self, channel: &str, message: Value) -> bool {
        tracing::debug!(channel = %channel, message = %message, "message (no callback configured)");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_protocol::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn dispatcher_routes_through_event_sender() {
        let (sink, mut rx) = event_channel();
        let dispatcher = Dispatcher::new(sink);

        dispatcher.emit(ClientEvent::Connected { channel: "a".into() });
        dispatcher.emit(ClientEvent::Message {
            channel: "a".into(),
            message: json!(1),
        });
        dispatcher.emit(ClientEvent::Error {
            channel: "a".into(),
            error: ErrorInfo::new(ErrorKind::Decode, "bad"),
        });
        dispatcher.emit(ClientEvent::Disconnected { channel: "a".into() });

        assert_eq!(rx.recv().await, Some(ClientEvent::Connected { channel: "a".into() }));
        assert_eq!(
            rx.recv().await,
            Some(ClientEvent::Message {
                channel: "a".into(),
                message: json!(1)
            })
        );
        assert!(matches!(rx.recv().await, Some(ClientEvent::Error { .. })));
        assert_eq!(rx.recv().await, Some(ClientEvent::Disconnected { channel: "a".into() }));
    }

    #[test]
    fn dropped_receiver_reports_false() {
        let (sink, rx) = event_channel();
        drop(rx);
        assert!(!sink.on_message("a", json!("x")));
    }
}
