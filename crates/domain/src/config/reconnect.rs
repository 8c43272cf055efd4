use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a channel worker paces its liveness probes after a dropped poll.
///
/// The defaults retry forever with a flat 5 second pause. Raise
/// `backoff_factor` above `1.0` for exponential growth up to
/// `max_delay_ms`, and set `max_attempts` to give up eventually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "d_5000")]
    pub initial_delay_ms: u64,
    #[serde(default = "d_5000")]
    pub max_delay_ms: u64,
    #[serde(default = "d_factor")]
    pub backoff_factor: f64,
    /// `0` means unlimited probes.
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default)]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 5_000,
            max_delay_ms: 5_000,
            backoff_factor: 1.0,
            max_attempts: 0,
            jitter: false,
        }
    }
}

fn d_5000() -> u64 {
    5_000
}
fn d_factor() -> f64 {
    1.0
}
