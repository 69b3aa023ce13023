//! Shared types for the session coordinator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle state of one coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Processing,
    Paused,
    Cancelled,
    Error,
    Completed,
}

impl ConnectionState {
    /// Whether the event stream is open or being opened in this state
    pub fn is_stream_live(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Processing | Self::Paused
        )
    }

    /// Whether a send cycle has reached an end state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Processing => "processing",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state transition reported to the state observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub from: ConnectionState,
    pub to: ConnectionState,
    /// Human-readable reason, always present for `Error`
    pub message: Option<String>,
}

/// One decoded unit from the event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Event id used as the resumption cursor, when the service provides one
    pub id: Option<String>,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl StreamRecord {
    /// Create a record without an id
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            payload,
        }
    }

    /// Attach an event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
