//! Append-only timeline of everything a coordinator observed or did
//!
//! Insertion order is the canonical event order. Entries are never reordered,
//! edited, or removed individually; the whole log is cleared only when a new
//! send cycle or connection begins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Category of a timeline entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Connection,
    Message,
    Thinking,
    Content,
    Tool,
    Permission,
    Control,
    Error,
}

/// One immutable timeline record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    pub kind: TimelineKind,
    pub timestamp: DateTime<Utc>,
    pub content: Value,
    pub metadata: HashMap<String, Value>,
}

impl TimelineEntry {
    pub fn new(kind: TimelineKind, content: impl Into<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get a string metadata value
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: TimelineEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    /// Entries of one kind, in insertion order
    pub fn of_kind(&self, kind: TimelineKind) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
