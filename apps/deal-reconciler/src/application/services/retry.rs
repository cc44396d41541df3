//! Reconnection Policy
//!
//! Fixed-delay, bounded reconnection for live deal streams. Every close is
//! followed by the same wait; after `max_retries` consecutive automatic
//! attempts without a successful open, the policy gives up.

use std::time::Duration;

/// Default number of automatic reconnects.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default wait before each reconnect.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum consecutive automatic reconnects.
    pub max_retries: u32,
    /// Wait before each reconnect.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with custom values.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }
}

/// Bounded fixed-delay reconnection policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt_count: u32,
}

impl RetryPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay before the next reconnect, or `None` once retries are exhausted.
    #[must_use]
    pub const fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt_count >= self.config.max_retries {
            return None;
        }
        self.attempt_count += 1;
        Some(self.config.delay)
    }

    /// Reset after a successful open or a manual reconnect.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Automatic reconnects made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another automatic reconnect is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempt_count < self.config.max_retries
    }

    /// Configured limits.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }
}
