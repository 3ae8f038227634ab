//! Idle auto-exit
//!
//! Ends the daemon after a stretch without hotkey activity. Only hotkey
//! events (and external record commands) count as activity; a long
//! recording does not, but the daemon never exits while one is running.

use crate::config::AutoTimeoutConfig;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct IdleWatchdog {
    timeout: Option<Duration>,
    last_activity: Instant,
}

impl IdleWatchdog {
    pub fn new(timeout: Option<Duration>, now: Instant) -> Self {
        Self {
            timeout,
            last_activity: now,
        }
    }

    pub fn from_config(config: &AutoTimeoutConfig, now: Instant) -> Self {
        let timeout = (config.enabled && config.minutes > 0)
            .then(|| Duration::from_secs(config.minutes.saturating_mul(60)));
        Self::new(timeout, now)
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    /// Record user activity
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Time is up and nothing is recording
    pub fn should_exit(&self, now: Instant, recording: bool) -> bool {
        match self.timeout {
            Some(timeout) => !recording && self.idle_for(now) > timeout,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn enabled(minutes: u64) -> AutoTimeoutConfig {
        AutoTimeoutConfig {
            enabled: true,
            minutes,
        }
    }

    #[test]
    fn test_disabled_never_exits() {
        let t0 = Instant::now();
        let dog = IdleWatchdog::from_config(&AutoTimeoutConfig::default(), t0);
        assert!(!dog.is_enabled());
        assert!(!dog.should_exit(t0 + MINUTE * 1000, false));
    }

    #[test]
    fn test_zero_minutes_is_disabled() {
        let dog = IdleWatchdog::from_config(&enabled(0), Instant::now());
        assert!(!dog.is_enabled());
    }

    #[test]
    fn test_exits_after_idle() {
        let t0 = Instant::now();
        let dog = IdleWatchdog::from_config(&enabled(5), t0);
        assert!(!dog.should_exit(t0 + MINUTE * 5, false));
        assert!(dog.should_exit(t0 + MINUTE * 5 + Duration::from_secs(1), false));
    }

    #[test]
    fn test_never_exits_mid_recording() {
        let t0 = Instant::now();
        let dog = IdleWatchdog::from_config(&enabled(1), t0);
        assert!(!dog.should_exit(t0 + MINUTE * 10, true));
    }

    #[test]
    fn test_touch_resets_idle() {
        let t0 = Instant::now();
        let mut dog = IdleWatchdog::from_config(&enabled(1), t0);
        dog.touch(t0 + MINUTE);
        assert!(!dog.should_exit(t0 + MINUTE * 2 - Duration::from_secs(1), false));
        assert_eq!(dog.idle_for(t0 + MINUTE * 2), MINUTE);
    }
}
