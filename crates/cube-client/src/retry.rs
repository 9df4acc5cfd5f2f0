//! Retry budget and exponential backoff.

use std::time::Duration;

/// Configuration for retry behavior.
///
/// Only "continue wait" responses and transport failures consume the
/// budget. Token rejections (HTTP 403) are tracked separately against
/// `max_reauth_attempts`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of counted attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff strategy to use.
    pub backoff: BackoffStrategy,
    /// Maximum token refreshes within one call.
    pub max_reauth_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            backoff: BackoffStrategy::Exponential { factor: 2.0 },
            max_reauth_attempts: 10,
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of counted attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the maximum token refreshes within one call.
    pub fn with_max_reauth_attempts(mut self, attempts: u32) -> Self {
        self.max_reauth_attempts = attempts;
        self
    }

    /// A single attempt; the first retryable outcome ends the call.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Short delays and a small budget, for tests and interactive tools.
    pub fn fast() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
            backoff: BackoffStrategy::Exponential { factor: 2.0 },
            max_reauth_attempts: 3,
        }
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given retry number (0-indexed).
    pub fn delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let seconds = match self {
            BackoffStrategy::Constant => initial_delay.as_secs_f64(),
            BackoffStrategy::Exponential { factor } => {
                let exponent = attempt.min(i32::MAX as u32) as i32;
                initial_delay.as_secs_f64() * factor.powi(exponent)
            }
        };

        // Cap before converting so huge exponents never overflow Duration
        let capped = seconds.min(max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }
}

/// Per-call retry state.
///
/// Created fresh for each logical request, so one call's retries never
/// leak into the next.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: u32,
    reauths: u32,
}

impl RetryPolicy {
    /// Create a new retry policy from config.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt: 0,
            reauths: 0,
        }
    }

    /// Number of counted retries recorded so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Number of token refreshes recorded so far.
    pub fn reauths(&self) -> u32 {
        self.reauths
    }

    /// Returns true while the counted budget is not exhausted.
    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_attempts
    }

    /// Record a counted failure and return the delay before the next attempt.
    ///
    /// Returns None once the counter reaches `max_attempts`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let delay = self.config.backoff.delay(
            self.attempt,
            self.config.initial_delay,
            self.config.max_delay,
        );

        self.attempt += 1;
        if !self.should_retry() {
            return None;
        }
        Some(delay)
    }

    /// Record a token refresh. Returns false once the refresh cap is exceeded.
    ///
    /// Does not touch the counted budget or the backoff schedule.
    pub fn record_reauth(&mut self) -> bool {
        self.reauths += 1;
        self.reauths <= self.config.max_reauth_attempts
    }
}
