//! Watcher lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a change-feed watcher
///
/// ```text
/// Idle --start()--> Opening --subscription ready--> Watching
/// Watching --event--> Paused --handler settles--> Watching
/// Watching --end/close--> Closing --stop flag clear--> Opening
/// Watching --close--> Closing --stop flag set--> Stopped
/// Watching --namespace not found--> Stopped
/// any --stop()--> Stopped
/// Stopped --start()--> Opening
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    /// Never started
    Idle,
    /// Reading the watermark and opening a subscription
    Opening,
    /// Subscription open, waiting for the next notification
    Watching,
    /// A handler is running; no further events are taken from the feed
    Paused,
    /// The subscription terminated and is being released
    Closing,
    /// Not watching; only an explicit `start()` resumes
    Stopped,
}

impl WatcherState {
    /// Whether the watcher currently holds an open subscription
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Watching | Self::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Watching => "watching",
            Self::Paused => "paused",
            Self::Closing => "closing",
            Self::Stopped => "stopped",
        }
    }
}

impl Default for WatcherState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(WatcherState::default(), WatcherState::Idle);
    }

    #[test]
    fn test_active_states() {
        assert!(WatcherState::Watching.is_active());
        assert!(WatcherState::Paused.is_active());
        assert!(!WatcherState::Opening.is_active());
        assert!(!WatcherState::Stopped.is_active());
    }
}
