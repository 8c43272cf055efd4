//! Response decoding for the four operations.
//!
//! | Operation | Body shape                                   |
//! |-----------|----------------------------------------------|
//! | subscribe | `[[msg, ...], "timetoken", "ch1,ch2"?]`      |
//! | history   | `[record, ...]`                              |
//! | time      | `[timestamp]`                                |
//! | publish   | `[status, "description", "timetoken"?]`      |

use ps_domain::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscribe
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A healthy long-poll response.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// In delivery order.
    pub messages: Vec<Value>,
    /// Cursor for the next poll. May be empty, in which case the caller
    /// keeps its previous cursor.
    pub timetoken: String,
    /// Comma-separated channel list, present on multiplexed responses.
    pub channels: Option<String>,
}

/// Why a long-poll response counts as a dropped connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No body at all (transport failure).
    NoResponse,
    /// Body was not a JSON array of the expected shape.
    Malformed(String),
    /// The liveness field was absent or zero.
    NotLive,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NoResponse => f.write_str("no response"),
            DropReason::Malformed(detail) => write!(f, "malformed response: {detail}"),
            DropReason::NotLive => f.write_str("liveness field is zero"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeResponse {
    Live(Envelope),
    Dropped(DropReason),
}

/// Classify a long-poll body. `None` means the transport produced nothing.
pub fn decode_subscribe(body: Option<&[u8]>) -> SubscribeResponse {
    let Some(body) = body else {
        return SubscribeResponse::Dropped(DropReason::NoResponse);
    };

    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return SubscribeResponse::Dropped(DropReason::Malformed(e.to_string())),
    };

    let Value::Array(mut parts) = value else {
        return SubscribeResponse::Dropped(DropReason::Malformed("expected a JSON array".into()));
    };

    if parts.len() < 2 || numeric(&parts[1]).map_or(true, |n| n == 0.0) {
        return SubscribeResponse::Dropped(DropReason::NotLive);
    }

    let channels = parts.get(2).and_then(Value::as_str).map(str::to_owned);
    let timetoken = match &parts[1] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let messages = match parts.swap_remove(0) {
        Value::Array(messages) => messages,
        other => {
            return SubscribeResponse::Dropped(DropReason::Malformed(format!(
                "message list is not an array: {other}"
            )))
        }
    };

    SubscribeResponse::Live(Envelope {
        messages,
        timetoken,
        channels,
    })
}

/// Interpret a JSON number or numeric string.
fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Time
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Server time as a timetoken, or `0` on any failure.
pub fn decode_time(body: &[u8]) -> u64 {
    let Ok(Value::Array(parts)) = serde_json::from_slice::<Value>(body) else {
        return 0;
    };
    match parts.first() {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn decode_history(body: &[u8]) -> Result<Vec<Value>> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(records) => Ok(records),
        other => Err(Error::Decode(format!(
            "history response is not an array: {other}"
        ))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Publish
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a publish call. Callers always receive one, even when the
/// request never reached the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// `1` on success, `0` on failure.
    pub status: i64,
    pub description: String,
    /// Timetoken assigned to the message, when the service returned one.
    pub timetoken: Option<String>,
}

impl PublishResult {
    /// A locally synthesized failure: `[0, "Error: {reason}"]`.
    pub fn failure(reason: impl std::fmt::Display) -> Self {
        Self {
            status: 0,
            description: format!("Error: {reason}"),
            timetoken: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 1
    }

    /// The array form the service uses on the wire.
    pub fn to_value(&self) -> Value {
        let mut parts = vec![
            Value::from(self.status),
            Value::from(self.description.clone()),
        ];
        if let Some(tt) = &self.timetoken {
            parts.push(Value::from(tt.clone()));
        }
        Value::Array(parts)
    }
}

/// Decode a publish body; anything unexpected becomes a synthesized failure.
pub fn decode_publish(body: &[u8]) -> PublishResult {
    let parts = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(parts)) if !parts.is_empty() => parts,
        Ok(_) => return PublishResult::failure("unexpected publish response"),
        Err(e) => return PublishResult::failure(format!("invalid publish response: {e}")),
    };

    let status = numeric(&parts[0]).map_or(0, |n| n as i64);
    let description = match parts.get(1) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let timetoken = parts.get(2).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    PublishResult {
        status,
        description,
        timetoken,
    }
}
