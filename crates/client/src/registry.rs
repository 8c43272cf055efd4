//! Channel subscription registry: the set of channels the application
//! wants live, and the per-channel state the workers read and update.
//!
//! All access goes through one mutex. Every decision that pairs a read
//! with a write (spawn or not, keep polling or exit) happens under a single
//! lock acquisition, so a caller's `subscribe` can never race a worker's
//! exit into two workers or zero workers for a wanted channel.

use std::collections::HashMap;

use parking_lot::Mutex;
use ps_protocol::TIMETOKEN_NOW;

/// Where a channel's worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// A long-poll is outstanding (or about to be issued).
    Active,
    /// The last poll was dropped; the worker is probing liveness.
    Reconnecting,
    /// No worker is running for this channel.
    Stopped,
}

/// Snapshot of one tracked channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub channel: String,
    /// The application wants this channel live.
    pub connected: bool,
    /// A connect event has been delivered since the channel became active.
    pub first_message_seen: bool,
    /// Cursor of the most recent poll; `"0"` means "from now".
    pub current_timetoken: String,
    pub phase: ChannelPhase,
}

impl ChannelState {
    fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_owned(),
            connected: true,
            first_message_seen: false,
            current_timetoken: TIMETOKEN_NOW.to_owned(),
            phase: ChannelPhase::Active,
        }
    }
}

/// Result of [`ChannelRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// No worker exists; the caller must start one.
    Spawn,
    /// A worker is still running from a previous subscription and will
    /// carry on polling.
    Reactivated,
    /// The channel is already live; nothing changed.
    AlreadyConnected,
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, ChannelState>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `channel` as wanted.
    pub fn subscribe(&self, channel: &str) -> SubscribeOutcome {
        let mut channels = self.channels.lock();
        match channels.get_mut(channel) {
            None => {
                channels.insert(channel.to_owned(), ChannelState::new(channel));
                SubscribeOutcome::Spawn
            }
            Some(state) if state.connected => SubscribeOutcome::AlreadyConnected,
            Some(state) => {
                state.connected = true;
                state.first_message_seen = false;
                if state.phase == ChannelPhase::Stopped {
                    state.phase = ChannelPhase::Active;
                    state.current_timetoken = TIMETOKEN_NOW.to_owned();
                    SubscribeOutcome::Spawn
                } else {
                    SubscribeOutcome::Reactivated
                }
            }
        }
    }

    /// Ask the worker for `channel` to stop after its in-flight poll.
    ///
    /// Returns `false` if the channel was not live.
    pub fn unsubscribe(&self, channel: &str) -> bool {
        let mut channels = self.channels.lock();
        match channels.get_mut(channel) {
            Some(state) if state.connected => {
                state.connected = false;
                state.first_message_seen = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .get(channel)
            .is_some_and(|s| s.connected)
    }

    pub fn snapshot(&self, channel: &str) -> Option<ChannelState> {
        self.channels.lock().get(channel).cloned()
    }

    pub fn timetoken(&self, channel: &str) -> Option<String> {
        self.channels
            .lock()
            .get(channel)
            .map(|s| s.current_timetoken.clone())
    }

    /// Live channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .lock()
            .values()
            .filter(|s| s.connected)
            .map(|s| s.channel.clone())
            .collect();
        names.sort();
        names
    }

    // ── worker-side operations ───────────────────────────────────────

    /// Called by a worker before each request and after each response.
    ///
    /// Returns `true` if the worker should keep going. A `false` answer
    /// changes nothing: the worker reports its disconnect first and then
    /// calls [`ChannelRegistry::finish`], so a fresh worker's connect can
    /// never overtake the old worker's disconnect.
    pub(crate) fn keep_polling(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .get(channel)
            .is_some_and(|s| s.connected)
    }

    /// Final exit decision for a worker that saw `keep_polling` fail.
    ///
    /// Returns `true` and marks the channel [`ChannelPhase::Stopped`] if it
    /// is still unwanted. Returns `false` if it was subscribed again in the
    /// meantime; that `subscribe` answered `Reactivated`, so the worker
    /// must carry on.
    pub(crate) fn finish(&self, channel: &str) -> bool {
        match self.channels.lock().get_mut(channel) {
            Some(state) if state.connected => false,
            Some(state) => {
                state.phase = ChannelPhase::Stopped;
                true
            }
            None => true,
        }
    }

    /// Force the channel into the stopped, unwanted state.
    pub(crate) fn stop(&self, channel: &str) {
        if let Some(state) = self.channels.lock().get_mut(channel) {
            state.connected = false;
            state.first_message_seen = false;
            state.phase = ChannelPhase::Stopped;
        }
    }

    /// Flip `first_message_seen`. Returns `true` only on the flip.
    pub(crate) fn mark_first_message(&self, channel: &str) -> bool {
        match self.channels.lock().get_mut(channel) {
            Some(state) if !state.first_message_seen => {
                state.first_message_seen = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_timetoken(&self, channel: &str, timetoken: &str) {
        if let Some(state) = self.channels.lock().get_mut(channel) {
            state.current_timetoken = timetoken.to_owned();
        }
    }

    pub(crate) fn mark_dropped(&self, channel: &str) {
        if let Some(state) = self.channels.lock().get_mut(channel) {
            state.phase = ChannelPhase::Reconnecting;
            state.first_message_seen = false;
        }
    }

    /// Leave the reconnecting phase at `timetoken`.
    ///
    /// Returns `false` without touching the state if the channel was
    /// unsubscribed while the worker was reconnecting.
    pub(crate) fn resume(&self, channel: &str, timetoken: &str) -> bool {
        match self.channels.lock().get_mut(channel) {
            Some(state) if state.connected => {
                state.phase = ChannelPhase::Active;
                state.current_timetoken = timetoken.to_owned();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_subscribe_spawns() {
        let reg = ChannelRegistry::new();
        assert_eq!(reg.subscribe("ch1"), SubscribeOutcome::Spawn);
        let state = reg.snapshot("ch1").unwrap();
        assert!(state.connected);
        assert!(!state.first_message_seen);
        assert_eq!(state.current_timetoken, "0");
        assert_eq!(state.phase, ChannelPhase::Active);
    }

    #[test]
    fn duplicate_subscribe_changes_nothing() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.set_timetoken("ch1", "42");
        reg.mark_first_message("ch1");
        let before = reg.snapshot("ch1");
        assert_eq!(reg.subscribe("ch1"), SubscribeOutcome::AlreadyConnected);
        assert_eq!(reg.snapshot("ch1"), before);
    }

    #[test]
    fn unsubscribe_clears_flags() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.mark_first_message("ch1");
        assert!(reg.unsubscribe("ch1"));
        let state = reg.snapshot("ch1").unwrap();
        assert!(!state.connected);
        assert!(!state.first_message_seen);
        assert!(!reg.unsubscribe("ch1"));
        assert!(!reg.unsubscribe("never"));
    }

    #[test]
    fn resubscribe_while_worker_alive_reactivates() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.unsubscribe("ch1");
        assert_eq!(reg.subscribe("ch1"), SubscribeOutcome::Reactivated);
        assert!(reg.keep_polling("ch1"));
    }

    #[test]
    fn resubscribe_after_worker_exit_spawns() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.set_timetoken("ch1", "99");
        reg.unsubscribe("ch1");
        assert!(!reg.keep_polling("ch1"));
        assert!(reg.finish("ch1"));
        assert_eq!(reg.snapshot("ch1").unwrap().phase, ChannelPhase::Stopped);
        assert_eq!(reg.subscribe("ch1"), SubscribeOutcome::Spawn);
        assert_eq!(reg.timetoken("ch1").as_deref(), Some("0"));
    }

    #[test]
    fn declined_poll_leaves_phase_until_finish() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.unsubscribe("ch1");
        assert!(!reg.keep_polling("ch1"));
        assert_eq!(reg.snapshot("ch1").unwrap().phase, ChannelPhase::Active);

        // Resubscribed between the worker's check and its exit: the old
        // worker is reused, so no second worker may be spawned.
        assert_eq!(reg.subscribe("ch1"), SubscribeOutcome::Reactivated);
        assert!(!reg.finish("ch1"));
        assert_eq!(reg.snapshot("ch1").unwrap().phase, ChannelPhase::Active);
    }

    #[test]
    fn resume_refused_after_unsubscribe() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.set_timetoken("ch1", "42");
        reg.mark_dropped("ch1");
        reg.unsubscribe("ch1");
        assert!(!reg.resume("ch1", "42"));
        assert_eq!(reg.snapshot("ch1").unwrap().phase, ChannelPhase::Reconnecting);

        reg.subscribe("ch1");
        assert!(reg.resume("ch1", "43"));
        let state = reg.snapshot("ch1").unwrap();
        assert_eq!(state.phase, ChannelPhase::Active);
        assert_eq!(state.current_timetoken, "43");
    }

    #[test]
    fn connect_flag_flips_once() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        assert!(reg.mark_first_message("ch1"));
        assert!(!reg.mark_first_message("ch1"));
        reg.mark_dropped("ch1");
        assert_eq!(reg.snapshot("ch1").unwrap().phase, ChannelPhase::Reconnecting);
        assert!(reg.mark_first_message("ch1"));
    }

    #[test]
    fn stop_forces_respawn_on_next_subscribe() {
        let reg = ChannelRegistry::new();
        reg.subscribe("ch1");
        reg.stop("ch1");
        assert!(!reg.is_connected("ch1"));
        assert_eq!(reg.subscribe("ch1"), SubscribeOutcome::Spawn);
    }

    #[test]
    fn channels_lists_only_live() {
        let reg = ChannelRegistry::new();
        reg.subscribe("b");
        reg.subscribe("a");
        reg.subscribe("c");
        reg.unsubscribe("c");
        assert_eq!(reg.channels(), vec!["a", "b"]);
    }
}
