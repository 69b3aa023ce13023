//! Tool call tracking types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Lifecycle status of a remote tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl ToolStatus {
    /// Parse a status string as sent by the service
    ///
    /// Unrecognised values map to `Pending` so a new status name never
    /// fails a whole event.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" | "in_progress" | "executing" => Self::Running,
            "completed" | "complete" | "success" | "succeeded" | "done" => Self::Completed,
            "error" | "failed" | "failure" => Self::Error,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One invocation of an external capability by the remote agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ToolStatus,
    pub parameters: HashMap<String, Value>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: ToolStatus::Pending,
            parameters: HashMap::new(),
            result: None,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Wall-clock execution time, defined only once both ends are known
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ToolStatus::Running
    }
}
