//! Reconnect policy for the liveness probe loop.

use std::time::Duration;

use ps_domain::config::ReconnectConfig;

/// Controls how a channel worker paces time-endpoint probes after a
/// dropped poll.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    /// Delay after the first failed probe.
    pub initial_delay: Duration,
    /// Maximum delay between probes (cap).
    pub max_delay: Duration,
    /// Multiplier applied after each failed probe. `1.0` keeps the delay flat.
    pub backoff_factor: f64,
    /// Maximum number of consecutive failed probes before giving up.
    /// `0` means unlimited retries.
    pub max_attempts: u32,
    /// Add up to 25% deterministic jitter to each delay.
    pub jitter: bool,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl ReconnectBackoff {
    /// Same delay forever.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            backoff_factor: 1.0,
            max_attempts: 0, // unlimited
            jitter: false,
        }
    }

    /// Doubling delay with a cap, jittered.
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            backoff_factor: 2.0,
            max_attempts: 0,
            jitter: true,
        }
    }

    /// Give up after `attempts` failed probes.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Compute the delay for the given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_factor.max(1.0).powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let jitter = if self.jitter {
            capped_ms * 0.25 * pseudo_random_fraction(attempt)
        } else {
            0.0
        };
        Duration::from_millis((capped_ms + jitter) as u64)
    }

    /// Whether the given number of failed probes exhausts the policy.
    pub fn should_give_up(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

impl From<&ReconnectConfig> for ReconnectBackoff {
    fn from(cfg: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff_factor: cfg.backoff_factor,
            max_attempts: cfg.max_attempts,
            jitter: cfg.jitter,
        }
    }
}

/// Cheap deterministic "random" fraction [0, 1) based on attempt number.
/// Not cryptographically secure, just enough to spread reconnect storms.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_mul(2654435761); // Knuth multiplicative hash
    (hash as f64) / (u32::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_flat_five_seconds() {
        let p = ReconnectBackoff::default();
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(p.delay_for_attempt(50), Duration::from_secs(5));
        assert_eq!(p.max_attempts, 0); // unlimited
    }

    #[test]
    fn exponential_delay_grows() {
        let p = ReconnectBackoff::exponential(Duration::from_secs(1), Duration::from_secs(60));
        let d0 = p.delay_for_attempt(0);
        let d1 = p.delay_for_attempt(1);
        let d2 = p.delay_for_attempt(2);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_capped_at_max() {
        let p = ReconnectBackoff {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            backoff_factor: 10.0,
            max_attempts: 0,
            jitter: true,
        };
        let d = p.delay_for_attempt(10);
        // Should not exceed max_delay + 25% jitter.
        assert!(d <= Duration::from_millis(37_500));
    }

    #[test]
    fn should_give_up_when_limited() {
        let p = ReconnectBackoff::default().with_max_attempts(5);
        assert!(!p.should_give_up(4));
        assert!(p.should_give_up(5));
        assert!(p.should_give_up(6));
    }

    #[test]
    fn unlimited_never_gives_up() {
        let p = ReconnectBackoff::default();
        assert!(!p.should_give_up(1_000_000));
    }

    #[test]
    fn built_from_config() {
        let cfg = ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_ms: 800,
            backoff_factor: 2.0,
            max_attempts: 3,
            jitter: false,
        };
        let p = ReconnectBackoff::from(&cfg);
        assert_eq!(p.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(p.delay_for_attempt(5), Duration::from_millis(800));
        assert!(p.should_give_up(3));
    }
}
