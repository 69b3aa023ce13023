//! Backoff strategies for reconnection
//!
//! Provides configurable backoff algorithms used when the service asks the
//! client to slow down before resuming its event stream.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for backoff behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first reconnect
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Maximum delay between reconnects
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Add random jitter to prevent thundering herd
    pub jitter: bool,
    /// Maximum jitter ratio (0.0 - 1.0)
    pub jitter_ratio: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::rate_limited()
    }
}

impl BackoffConfig {
    /// Create a new backoff config with custom initial delay
    pub fn with_initial_delay(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..Default::default()
        }
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Create config tuned for rate-limited services
    pub fn rate_limited() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: true,
            jitter_ratio: 0.3,
        }
    }
}

/// Backoff strategy trait
pub trait BackoffStrategy: Send + Sync {
    /// Get the delay for the given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Exponential backoff implementation
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }

        let jitter_range = delay.as_secs_f64() * self.config.jitter_ratio;
        let jitter = rand_jitter(jitter_range);
        let jittered = delay.as_secs_f64() + jitter;

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_delay =
            self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(exponent);

        let capped_delay =
            Duration::from_secs_f64(base_delay.min(self.config.max_delay.as_secs_f64()));

        self.add_jitter(capped_delay)
    }
}

/// Constant backoff - same delay for all attempts
#[derive(Debug, Clone)]
pub struct ConstantBackoff {
    delay: Duration,
}

impl ConstantBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for ConstantBackoff {
    fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Simple pseudo-random jitter generator
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let hash = nanos.wrapping_mul(2654435761);
    let normalized = (hash as f64) / (u32::MAX as f64);

    normalized * range
}
