//! Pending permission requests
//!
//! A permission request is a remote ask for caller authorization before a
//! tool call proceeds. Each request leaves the pending table exactly once:
//! whichever of grant or deny resolves it first wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A remote ask for authorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: String,
    pub session_id: String,
    pub tool_name: String,
    pub description: String,
    pub action: String,
    pub path: String,
    pub params: HashMap<String, Value>,
    pub requested_at: DateTime<Utc>,
}

/// How a permission request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Granted,
    Denied,
}

impl PermissionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

/// Pending permission table
///
/// Resolution happens in two steps so the collaborator call can run outside
/// the coordinator lock: [`reserve`](Self::reserve) moves the request out of
/// the pending set, then [`complete`](Self::complete) drops it or
/// [`release`](Self::release) puts it back if the call failed. A reserved
/// request is invisible to a second resolver.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    pending: HashMap<String, PermissionRequest>,
    reserved: HashMap<String, PermissionRequest>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new pending request, replacing any pending one with the same id
    pub fn insert(&mut self, request: PermissionRequest) {
        self.pending.insert(request.id.clone(), request);
    }

    pub fn get(&self, id: &str) -> Option<&PermissionRequest> {
        self.pending.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Take a pending request out for resolution
    pub fn reserve(&mut self, id: &str) -> Option<PermissionRequest> {
        let request = self.pending.remove(id)?;
        self.reserved.insert(id.to_string(), request.clone());
        Some(request)
    }

    /// Finish a resolution; the request is gone for good
    pub fn complete(&mut self, id: &str) -> Option<PermissionRequest> {
        self.reserved.remove(id)
    }

    /// Abort a resolution; the request is pending again
    pub fn release(&mut self, id: &str) {
        if let Some(request) = self.reserved.remove(id) {
            self.pending.insert(id.to_string(), request);
        }
    }

    /// Pending requests ordered by arrival
    pub fn snapshot(&self) -> Vec<PermissionRequest> {
        let mut requests: Vec<_> = self.pending.values().cloned().collect();
        requests.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        requests
    }

    pub fn pending_permission_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop pending requests; in-flight reservations are kept so their
    /// resolution can still finish
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
