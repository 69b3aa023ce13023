//! Caller callback table
//!
//! Each slot is optional; an empty slot simply means nobody is listening
//! for that kind of update. Handlers never run concurrently with each other
//! and see updates in the order they were applied, on whichever task is
//! draining the dispatcher's outbox. They must not block: a slow handler
//! delays every later update for its coordinator.

use std::fmt;
use std::sync::Arc;

use crate::permission::PermissionRequest;
use crate::recovery::RateLimitSignal;
use crate::tools::ToolCall;
use crate::types::StateChange;

pub type DeltaHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type ToolHandler = Arc<dyn Fn(&ToolCall) + Send + Sync>;
pub type PermissionHandler = Arc<dyn Fn(&PermissionRequest) + Send + Sync>;
pub type StateHandler = Arc<dyn Fn(&StateChange) + Send + Sync>;
pub type RateLimitHandler = Arc<dyn Fn(&RateLimitSignal) + Send + Sync>;

/// An update produced while the session lock was held, delivered after it
/// is released
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StateChanged(StateChange),
    ThinkingDelta(String),
    ContentDelta(String),
    ToolUpdated(ToolCall),
    PermissionRequested(PermissionRequest),
    RateLimited(RateLimitSignal),
}

#[derive(Clone, Default)]
pub struct EventHandlers {
    pub on_state_change: Option<StateHandler>,
    pub on_thinking_delta: Option<DeltaHandler>,
    pub on_content_delta: Option<DeltaHandler>,
    pub on_tool_update: Option<ToolHandler>,
    pub on_permission_request: Option<PermissionHandler>,
    pub on_rate_limit: Option<RateLimitHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the handler matching a notification, if one is registered
    pub fn notify(&self, notification: &Notification) {
        match notification {
            Notification::StateChanged(change) => {
                if let Some(handler) = &self.on_state_change {
                    handler(change);
                }
            }
            Notification::ThinkingDelta(delta) => {
                if let Some(handler) = &self.on_thinking_delta {
                    handler(delta);
                }
            }
            Notification::ContentDelta(delta) => {
                if let Some(handler) = &self.on_content_delta {
                    handler(delta);
                }
            }
            Notification::ToolUpdated(call) => {
                if let Some(handler) = &self.on_tool_update {
                    handler(call);
                }
            }
            Notification::PermissionRequested(request) => {
                if let Some(handler) = &self.on_permission_request {
                    handler(request);
                }
            }
            Notification::RateLimited(signal) => {
                if let Some(handler) = &self.on_rate_limit {
                    handler(signal);
                }
            }
        }
    }

    pub fn notify_all(&self, notifications: &[Notification]) {
        for notification in notifications {
            self.notify(notification);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_thinking_delta", &self.on_thinking_delta.is_some())
            .field("on_content_delta", &self.on_content_delta.is_some())
            .field("on_tool_update", &self.on_tool_update.is_some())
            .field("on_permission_request", &self.on_permission_request.is_some())
            .field("on_rate_limit", &self.on_rate_limit.is_some())
            .finish()
    }
}
