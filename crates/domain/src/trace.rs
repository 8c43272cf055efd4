use serde::Serialize;

/// Structured trace events emitted across all pubsub-client crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RequestCompleted {
        operation: String,
        channel: Option<String>,
        ok: bool,
        duration_ms: u64,
    },
    ChannelConnected {
        channel: String,
    },
    ChannelDropped {
        channel: String,
        timetoken: String,
        reason: String,
    },
    ReconnectProbe {
        channel: String,
        attempt: u32,
        delay_ms: u64,
    },
    ChannelResumed {
        channel: String,
        timetoken: String,
        attempts: u32,
    },
    ChannelStopped {
        channel: String,
        reason: String,
    },
    MessageDecryptFailed {
        channel: String,
        index: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ps_event");
    }
}
