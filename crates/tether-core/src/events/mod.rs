//! Typed events decoded from raw stream records
//!
//! The service tags every record with an event type; this module turns the
//! `(event_type, payload)` pair into a [`StreamEvent`]. Unknown event types
//! decode to [`StreamEvent::Unknown`] so newer services keep working with
//! older clients.

pub mod dispatcher;
pub mod handlers;
mod wire;

#[cfg(test)]
mod tests;

pub use dispatcher::EventDispatcher;
pub use handlers::{EventHandlers, Notification};

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::TetherResult;
use crate::recovery::RetryHint;
use crate::tools::{ToolStatus, ToolUpsert};
use crate::types::StreamRecord;

/// Fields of a `permission` event
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionPayload {
    pub id: String,
    pub session_id: Option<String>,
    pub tool_name: String,
    pub description: String,
    pub action: String,
    pub path: String,
    pub params: HashMap<String, Value>,
}

/// One classified stream record
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected {
        payload: Value,
    },
    Heartbeat,
    Thinking {
        delta: String,
    },
    Content {
        delta: String,
    },
    Tool(ToolUpsert),
    ToolExecutionStart {
        tool_call_id: String,
        progress: Option<String>,
    },
    ToolExecutionComplete {
        tool_call_id: String,
        success: bool,
        output: String,
    },
    Permission(PermissionPayload),
    Complete {
        reason: Option<String>,
        /// Final reasoning text reported by the service
        reasoning: Option<String>,
        /// Reasoning time measured by the service
        reasoning_duration: Option<Duration>,
    },
    Error {
        message: String,
        retry: Option<RetryHint>,
    },
    Unknown {
        event_type: String,
    },
}

impl StreamEvent {
    /// Classify and decode a raw record
    pub fn decode(record: &StreamRecord) -> TetherResult<Self> {
        let event_type = record.event_type.trim();
        let payload = &record.payload;

        let event = match event_type {
            "connected" => Self::Connected {
                payload: payload.clone(),
            },
            "heartbeat" | "ping" => Self::Heartbeat,
            "thinking" => Self::Thinking {
                delta: wire::delta(event_type, payload)?,
            },
            "content" => Self::Content {
                delta: wire::delta(event_type, payload)?,
            },
            "tool" => {
                let tool = wire::tool(event_type, payload)?;
                Self::Tool(ToolUpsert {
                    id: tool.id,
                    name: tool.name,
                    description: tool.description,
                    status: tool.status.as_deref().map(ToolStatus::parse),
                    parameters: tool.parameters,
                })
            }
            "tool_execution_start" => {
                let start = wire::execution(event_type, payload)?;
                Self::ToolExecutionStart {
                    tool_call_id: start.tool_call_id,
                    progress: start.progress,
                }
            }
            "tool_execution_complete" => {
                let done = wire::execution(event_type, payload)?;
                let success = done.success.unwrap_or(done.error.is_none());
                let output = if success {
                    done.result.or(done.progress).unwrap_or_default()
                } else {
                    done.error
                        .or(done.progress)
                        .unwrap_or_else(|| "tool execution failed".to_string())
                };
                Self::ToolExecutionComplete {
                    tool_call_id: done.tool_call_id,
                    success,
                    output,
                }
            }
            "permission" => Self::Permission(wire::permission(event_type, payload)?),
            "complete" | "done" => {
                let done: wire::CompletePayload = if payload.is_object() {
                    wire::from_value(event_type, payload)?
                } else {
                    wire::CompletePayload::default()
                };
                Self::Complete {
                    reasoning: done.reasoning(),
                    reasoning_duration: done.reasoning_duration(),
                    reason: done.reason,
                }
            }
            "error" => {
                let error: wire::ErrorPayload = if let Some(text) = payload.as_str() {
                    wire::ErrorPayload {
                        message: Some(text.to_string()),
                        ..Default::default()
                    }
                } else {
                    wire::from_value(event_type, payload)?
                };
                Self::Error {
                    message: error
                        .text()
                        .unwrap_or_else(|| "unknown stream error".to_string()),
                    retry: error.retry_hint(),
                }
            }
            other => Self::Unknown {
                event_type: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Wire name of the event
    pub fn event_type(&self) -> &str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Heartbeat => "heartbeat",
            Self::Thinking { .. } => "thinking",
            Self::Content { .. } => "content",
            Self::Tool(_) => "tool",
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionComplete { .. } => "tool_execution_complete",
            Self::Permission(_) => "permission",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::Unknown { event_type } => event_type,
        }
    }
}
