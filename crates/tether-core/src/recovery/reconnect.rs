//! Rate-limit signals and reconnection decisions
//!
//! The coordinator never reconnects on its own. It records the service's
//! retry hint, and the caller asks for a [`ReconnectDecision`] when it is
//! ready to resume with the last event id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::backoff::{BackoffConfig, BackoffStrategy, ExponentialBackoff};

/// Server hint to delay before reconnecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSignal {
    pub retry_after_ms: u64,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RateLimitSignal {
    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms)
    }

    /// No attempts left according to the signal
    pub fn is_exhausted(&self) -> bool {
        self.attempt > self.max_attempts
    }
}

/// Raw retry hint pulled from an error event before defaults are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryHint {
    pub retry_after_ms: u64,
    pub attempt: Option<u32>,
    pub max_attempts: Option<u32>,
}

/// Caller-supplied reconnection strategy
pub trait ReconnectStrategy: Send + Sync {
    /// Local delay to wait before the given signal's attempt
    fn delay(&self, signal: &RateLimitSignal) -> Duration;
}

impl<B: BackoffStrategy> ReconnectStrategy for B {
    fn delay(&self, signal: &RateLimitSignal) -> Duration {
        self.delay_for_attempt(signal.attempt.saturating_sub(1))
    }
}

/// What the caller should do about a recorded rate-limit signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait `delay`, then `start()` again; the stream resumes after `last_event_id`
    Retry {
        delay: Duration,
        attempt: u32,
        last_event_id: Option<String>,
    },
    /// The attempt budget is spent
    GiveUp {
        attempts: u32,
        last_event_id: Option<String>,
    },
}

impl ReconnectDecision {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Retry { delay, .. } => Some(*delay),
            Self::GiveUp { .. } => None,
        }
    }
}

/// Tracks rate-limit signals across reconnect attempts
pub struct ReconnectPolicy {
    strategy: Arc<dyn ReconnectStrategy>,
    default_max_attempts: u32,
    pending: Option<RateLimitSignal>,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(strategy: Arc<dyn ReconnectStrategy>, default_max_attempts: u32) -> Self {
        Self {
            strategy,
            default_max_attempts,
            pending: None,
            attempts: 0,
        }
    }

    pub fn with_backoff(config: BackoffConfig, default_max_attempts: u32) -> Self {
        Self::new(
            Arc::new(ExponentialBackoff::with_config(config)),
            default_max_attempts,
        )
    }

    pub fn set_strategy(&mut self, strategy: Arc<dyn ReconnectStrategy>) {
        self.strategy = strategy;
    }

    /// Turn a hint into a signal and hold it until the next decision
    ///
    /// A hint without an attempt number counts as the first attempt.
    pub fn record(&mut self, hint: RetryHint) -> RateLimitSignal {
        let attempt = hint.attempt.unwrap_or(1).max(1);
        let signal = RateLimitSignal {
            retry_after_ms: hint.retry_after_ms,
            attempt,
            max_attempts: hint.max_attempts.unwrap_or(self.default_max_attempts),
        };
        self.attempts = attempt;
        self.pending = Some(signal);
        signal
    }

    pub fn pending(&self) -> Option<&RateLimitSignal> {
        self.pending.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Consume the pending signal and decide how to resume
    pub fn take_decision(&mut self, last_event_id: Option<String>) -> Option<ReconnectDecision> {
        let signal = self.pending.take()?;
        if signal.is_exhausted() {
            return Some(ReconnectDecision::GiveUp {
                attempts: signal.attempt.saturating_sub(1),
                last_event_id,
            });
        }
        let delay = signal.retry_after().max(self.strategy.delay(&signal));
        Some(ReconnectDecision::Retry {
            delay,
            attempt: signal.attempt,
            last_event_id,
        })
    }

    /// Forget attempt history after a successful exchange
    pub fn reset(&mut self) {
        self.pending = None;
        self.attempts = 0;
    }
}

impl fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectPolicy")
            .field("default_max_attempts", &self.default_max_attempts)
            .field("pending", &self.pending)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::backoff::ConstantBackoff;

    fn policy(local_delay: Duration) -> ReconnectPolicy {
        ReconnectPolicy::new(Arc::new(ConstantBackoff::new(local_delay)), 3)
    }

    #[test]
    fn test_record_fills_defaults() {
        let mut policy = policy(Duration::ZERO);
        let first = policy.record(RetryHint {
            retry_after_ms: 500,
            ..Default::default()
        });
        assert_eq!(first.attempt, 1);
        assert_eq!(first.max_attempts, 3);

        let second = policy.record(RetryHint {
            retry_after_ms: 500,
            ..Default::default()
        });
        assert_eq!(second.attempt, 1);
        assert_eq!(policy.attempts(), 1);

        let explicit = policy.record(RetryHint {
            retry_after_ms: 10,
            attempt: Some(7),
            max_attempts: Some(9),
        });
        assert_eq!(explicit.attempt, 7);
        assert_eq!(explicit.max_attempts, 9);
    }

    #[test]
    fn test_decision_uses_larger_delay() {
        let mut policy = policy(Duration::from_millis(200));
        policy.record(RetryHint {
            retry_after_ms: 1500,
            ..Default::default()
        });
        let decision = policy.take_decision(Some("evt-9".into())).unwrap();
        assert_eq!(
            decision,
            ReconnectDecision::Retry {
                delay: Duration::from_millis(1500),
                attempt: 1,
                last_event_id: Some("evt-9".into()),
            }
        );

        policy.record(RetryHint {
            retry_after_ms: 50,
            ..Default::default()
        });
        let decision = policy.take_decision(None).unwrap();
        assert_eq!(decision.delay(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_decision_consumes_signal() {
        let mut policy = policy(Duration::ZERO);
        assert!(policy.take_decision(None).is_none());
        policy.record(RetryHint {
            retry_after_ms: 100,
            ..Default::default()
        });
        assert!(policy.take_decision(None).is_some());
        assert!(policy.take_decision(None).is_none());
    }

    #[test]
    fn test_give_up_after_budget() {
        let mut policy = policy(Duration::ZERO);
        policy.record(RetryHint {
            retry_after_ms: 100,
            attempt: Some(4),
            max_attempts: Some(3),
        });
        let decision = policy.take_decision(Some("evt-1".into())).unwrap();
        assert_eq!(
            decision,
            ReconnectDecision::GiveUp {
                attempts: 3,
                last_event_id: Some("evt-1".into()),
            }
        );
    }

    #[test]
    fn test_reset() {
        let mut policy = policy(Duration::ZERO);
        policy.record(RetryHint {
            retry_after_ms: 100,
            ..Default::default()
        });
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert!(policy.pending().is_none());
    }
}
