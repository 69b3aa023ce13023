//! Keyed registry of tool calls seen during a send cycle

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use super::types::{ToolCall, ToolStatus};

/// Fields carried by a `tool` event, applied as an upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolUpsert {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ToolStatus>,
    pub parameters: Option<HashMap<String, Value>>,
}

/// Registry of tool calls keyed by id
///
/// Calls are created on first sighting and mutated in place afterwards;
/// nothing is removed until the registry is cleared for a new cycle.
#[derive(Debug, Clone, Default)]
pub struct ToolCallRegistry {
    calls: HashMap<String, ToolCall>,
    order: Vec<String>,
}

impl ToolCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a tool call, returning the updated value
    pub fn upsert(&mut self, update: ToolUpsert, now: DateTime<Utc>) -> &ToolCall {
        if !self.calls.contains_key(&update.id) {
            self.order.push(update.id.clone());
        }
        let call = self
            .calls
            .entry(update.id.clone())
            .or_insert_with(|| ToolCall::new(update.id.clone(), String::new()));

        if let Some(name) = update.name {
            if !name.is_empty() {
                call.name = name;
            }
        }
        if let Some(description) = update.description {
            call.description = description;
        }
        if call.description.is_empty() && !call.name.is_empty() {
            call.description = format!("Executing {}", call.name);
        }
        if let Some(parameters) = update.parameters {
            call.parameters = parameters;
        }
        if let Some(status) = update.status {
            Self::apply_status(call, status, now);
        }
        call
    }

    /// Mark an existing call as running
    pub fn mark_running(
        &mut self,
        id: &str,
        progress: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<&ToolCall> {
        let call = self.calls.get_mut(id)?;
        call.status = ToolStatus::Running;
        call.started_at = Some(now);
        if let Some(progress) = progress {
            call.description = progress;
        }
        Some(call)
    }

    /// Record the outcome of an existing call
    pub fn mark_finished(
        &mut self,
        id: &str,
        success: bool,
        output: String,
        now: DateTime<Utc>,
    ) -> Option<&ToolCall> {
        let call = self.calls.get_mut(id)?;
        call.ended_at = Some(now);
        if success {
            call.status = ToolStatus::Completed;
            call.result = Some(output);
        } else {
            call.status = ToolStatus::Error;
            call.error = Some(output);
        }
        Some(call)
    }

    fn apply_status(call: &mut ToolCall, status: ToolStatus, now: DateTime<Utc>) {
        if status == ToolStatus::Running && call.status != ToolStatus::Running {
            call.started_at = Some(now);
        }
        if status.is_finished() && call.ended_at.is_none() {
            call.ended_at = Some(now);
        }
        call.status = status;
    }

    pub fn get(&self, id: &str) -> Option<&ToolCall> {
        self.calls.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.calls.contains_key(id)
    }

    /// Snapshot of every call in first-sighting order
    pub fn snapshot(&self) -> Vec<ToolCall> {
        self.order
            .iter()
            .filter_map(|id| self.calls.get(id))
            .cloned()
            .collect()
    }

    pub fn running_tool_count(&self) -> usize {
        self.calls.values().filter(|c| c.is_running()).count()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.order.clear();
    }
}
