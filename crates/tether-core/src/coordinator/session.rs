//! The exclusive state region of one coordinator
//!
//! Everything the stream task and caller operations both touch lives in
//! [`SessionState`], guarded by a single lock in the coordinator. Methods
//! here never block and never call out to handlers; they append the
//! updates to report to a notification list instead.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use super::state_machine::StateMachine;
use super::stats::StreamingStats;
use crate::events::Notification;
use crate::permission::PermissionRegistry;
use crate::recovery::ReconnectPolicy;
use crate::timeline::{Timeline, TimelineEntry, TimelineKind};
use crate::tools::ToolCallRegistry;
use crate::types::ConnectionState;

/// Per-send-cycle accumulators
#[derive(Debug, Default)]
pub(crate) struct CycleState {
    pub content: String,
    pub reasoning: String,
    pub content_chars: usize,
    pub reasoning_chars: usize,
    pub completed: bool,
    pub in_flight: bool,
    pub started_at: Option<Instant>,
    pub reasoning_started_at: Option<Instant>,
    pub reasoning_duration: Option<Duration>,
    pub processing_time: Option<Duration>,
}

impl CycleState {
    /// Close the reasoning phase once, when content starts or the cycle ends
    pub fn finish_reasoning(&mut self, now: Instant) {
        if self.reasoning_duration.is_none() {
            if let Some(started) = self.reasoning_started_at {
                self.reasoning_duration = Some(now.duration_since(started));
            }
        }
    }
}

/// Resumption cursor and replay filter
///
/// Survives cycle resets and restarts so a reconnect with `Last-Event-ID`
/// does not apply the same record twice.
#[derive(Debug)]
pub(crate) struct ReplayCursor {
    last_event_id: Option<String>,
    seen: Option<LruCache<String, ()>>,
}

impl ReplayCursor {
    pub fn new(capacity: usize) -> Self {
        Self {
            last_event_id: None,
            seen: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn is_duplicate(&self, id: &str) -> bool {
        self.seen.as_ref().is_some_and(|seen| seen.contains(id))
    }

    pub fn mark_processed(&mut self, id: String) {
        if let Some(seen) = self.seen.as_mut() {
            seen.put(id.clone(), ());
        }
        self.last_event_id = Some(id);
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }
}

pub(crate) struct SessionState {
    pub session_id: String,
    pub machine: StateMachine,
    pub timeline: Timeline,
    pub tools: ToolCallRegistry,
    pub permissions: PermissionRegistry,
    pub cycle: CycleState,
    pub stats: StreamingStats,
    pub replay: ReplayCursor,
    pub reconnect: ReconnectPolicy,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(
        session_id: impl Into<String>,
        seen_event_capacity: usize,
        reconnect: ReconnectPolicy,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            machine: StateMachine::new(),
            timeline: Timeline::new(),
            tools: ToolCallRegistry::new(),
            permissions: PermissionRegistry::new(),
            cycle: CycleState::default(),
            stats: StreamingStats::default(),
            replay: ReplayCursor::new(seen_event_capacity),
            reconnect,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Attempt a transition, queueing the observer notification on success
    pub fn transition(
        &mut self,
        to: ConnectionState,
        message: Option<String>,
        out: &mut Vec<Notification>,
    ) -> bool {
        match self.machine.transition(to, message) {
            Some(change) => {
                out.push(Notification::StateChanged(change));
                true
            }
            None => false,
        }
    }

    /// Clear everything scoped to one exchange
    pub fn reset_cycle(&mut self) {
        self.timeline.clear();
        self.tools.clear();
        self.permissions.clear();
        self.cycle = CycleState::default();
    }

    /// Clear everything scoped to one connection; counters survive
    pub fn reset_connection(&mut self) {
        self.reset_cycle();
        self.last_error = None;
    }

    pub fn record(&mut self, entry: TimelineEntry) {
        self.timeline.append(entry);
    }

    /// Enter `Error` with an audit entry; ends any in-flight cycle
    pub fn fault(&mut self, kind: TimelineKind, message: String, out: &mut Vec<Notification>) {
        tracing::warn!(session_id = %self.session_id, error = %message, "session fault");
        self.record(TimelineEntry::new(kind, message.clone()).with_metadata("fault", true));
        self.cycle.in_flight = false;
        self.last_error = Some(message.clone());
        self.transition(ConnectionState::Error, Some(message), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_cursor_tracks_last_and_seen() {
        let mut cursor = ReplayCursor::new(2);
        assert!(!cursor.is_duplicate("e1"));
        cursor.mark_processed("e1".into());
        cursor.mark_processed("e2".into());
        assert!(cursor.is_duplicate("e1"));
        assert_eq!(cursor.last_event_id(), Some("e2"));

        // Capacity 2 evicts the oldest id
        cursor.mark_processed("e3".into());
        assert!(!cursor.is_duplicate("e1"));
        assert!(cursor.is_duplicate("e3"));
    }

    #[test]
    fn test_replay_cursor_disabled() {
        let mut cursor = ReplayCursor::new(0);
        cursor.mark_processed("e1".into());
        assert!(!cursor.is_duplicate("e1"));
        assert_eq!(cursor.last_event_id(), Some("e1"));
    }
}
