//! Restart backoff for watchers

use crate::config::RestartConfig;
use std::time::Duration;

/// Delay schedule applied between consecutive restarts
///
/// The first restart after a healthy subscription happens immediately.
/// Each further consecutive failure waits `initial_delay * multiplier^(n-1)`,
/// capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RestartPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    /// Restart immediately every time
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Delay before restart number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi((attempt - 1).min(64) as i32);
        let delay_ms = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30), 2.0)
    }
}

impl From<&RestartConfig> for RestartPolicy {
    fn from(config: &RestartConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_multiplier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0 ; "first restart is immediate")]
    #[test_case(1, 100 ; "first retry waits initial delay")]
    #[test_case(2, 200 ; "second retry doubles")]
    #[test_case(4, 800 ; "fourth retry")]
    #[test_case(10, 1000 ; "capped at max delay")]
    fn test_delay_schedule(attempt: u32, expected_ms: u64) {
        let policy = RestartPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(1000),
            2.0,
        );
        assert_eq!(policy.delay(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_immediate_never_waits() {
        let policy = RestartPolicy::immediate();
        assert_eq!(policy.delay(7), Duration::ZERO);
    }

    #[test]
    fn test_multiplier_below_one_is_clamped() {
        let policy = RestartPolicy::new(Duration::from_millis(50), Duration::from_secs(1), 0.5);
        assert_eq!(policy.delay(3), Duration::from_millis(50));
    }
}
