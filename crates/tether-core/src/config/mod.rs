//! Coordinator configuration
//!
//! Configuration is resolved in this order (later wins):
//! 1. Built-in defaults
//! 2. A TOML file (`tether.toml` or an explicit path)
//! 3. `TETHER_*` environment variables

mod loader;

pub use loader::{ConfigLoader, ENV_PREFIX, load_file};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{TetherError, TetherResult};
use crate::recovery::BackoffConfig;

/// Default bound on how long `stop()` waits for the stream task
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of recent event ids remembered for replay de-duplication
pub const DEFAULT_SEEN_EVENT_CAPACITY: usize = 1024;

/// Default reconnect budget when the service does not send one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Settings for one session coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long `stop()` waits for the stream task before aborting it
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    /// Recent event ids remembered to skip replayed records; 0 disables
    pub seen_event_capacity: usize,
    /// Reconnect budget used when an error event carries no `max_attempts`
    pub default_max_attempts: u32,
    /// Local backoff combined with the service's retry hint
    pub backoff: BackoffConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            seen_event_capacity: DEFAULT_SEEN_EVENT_CAPACITY,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_seen_event_capacity(mut self, capacity: usize) -> Self {
        self.seen_event_capacity = capacity;
        self
    }

    pub fn with_default_max_attempts(mut self, attempts: u32) -> Self {
        self.default_max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn validate(&self) -> TetherResult<()> {
        if self.stop_timeout.is_zero() {
            return Err(TetherError::config_with_context(
                "stop_timeout must be greater than zero",
                "stop_timeout",
            ));
        }
        if self.default_max_attempts == 0 {
            return Err(TetherError::config_with_context(
                "default_max_attempts must be at least 1",
                "default_max_attempts",
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(TetherError::config_with_context(
                "backoff multiplier must be >= 1.0",
                "backoff.multiplier",
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_ratio) {
            return Err(TetherError::config_with_context(
                "backoff jitter_ratio must be between 0.0 and 1.0",
                "backoff.jitter_ratio",
            ));
        }
        Ok(())
    }
}
