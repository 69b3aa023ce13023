//! Rate-limit and reconnection handling
//!
//! - Backoff strategies for spacing reconnect attempts
//! - Rate-limit signal tracking and reconnect decisions

pub mod backoff;
pub mod reconnect;

pub use backoff::{BackoffConfig, BackoffStrategy, ConstantBackoff, ExponentialBackoff};
pub use reconnect::{
    RateLimitSignal, ReconnectDecision, ReconnectPolicy, ReconnectStrategy, RetryHint,
};
