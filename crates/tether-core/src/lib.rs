//! Tether Core Library
//!
//! Client-side coordination for services that take a message over one
//! channel and report progress over a separate event stream. This crate
//! provides the connection lifecycle, event dispatch, tool and permission
//! tracking, the session timeline, and rate-limit handling.

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod permission;
pub mod recovery;
pub mod timeline;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use backend::{ChannelBackend, EventStream, SessionBackend, StreamFeed};
pub use config::{ConfigLoader, CoordinatorConfig};
pub use coordinator::{StreamingCoordinator, StreamingStats};
pub use error::{TetherError, TetherResult, UnifiedError};
pub use events::{EventHandlers, StreamEvent};
pub use permission::{PermissionDecision, PermissionRequest};
pub use recovery::{
    BackoffConfig, ExponentialBackoff, RateLimitSignal, ReconnectDecision, ReconnectStrategy,
};
pub use timeline::{TimelineEntry, TimelineKind};
pub use tools::{ToolCall, ToolStatus};
pub use types::*;
