//! Event dispatcher
//!
//! Applies one stream record at a time to the session state and hands the
//! resulting notifications to the registered handlers. Effects are recorded
//! under the session lock; handlers run after it is released, so a handler
//! may read coordinator accessors without deadlocking.
//!
//! Notifications are queued in an outbox while the session lock is held, so
//! the queue follows effect order no matter which task produced them. Only
//! one task drains the outbox at a time; the others leave their work to it.
//! Lock order is session, then outbox, and handlers run with neither held.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::handlers::{EventHandlers, Notification};
use super::{PermissionPayload, StreamEvent};
use crate::coordinator::session::SessionState;
use crate::permission::PermissionRequest;
use crate::recovery::RetryHint;
use crate::timeline::{TimelineEntry, TimelineKind};
use crate::tools::ToolCall;
use crate::types::{ConnectionState, StreamRecord};

#[derive(Debug, Default)]
struct Outbox {
    pending: VecDeque<Notification>,
    draining: bool,
}

#[derive(Debug, Clone)]
pub struct EventDispatcher {
    handlers: Arc<RwLock<EventHandlers>>,
    outbox: Arc<Mutex<Outbox>>,
}

impl EventDispatcher {
    pub fn new(handlers: Arc<RwLock<EventHandlers>>) -> Self {
        Self {
            handlers,
            outbox: Arc::new(Mutex::new(Outbox::default())),
        }
    }

    /// Apply a record and invoke handlers for its effects
    ///
    /// Nothing is applied once `cancel` has fired, so a stopped or replaced
    /// stream task cannot write into a newer connection.
    pub(crate) fn dispatch(
        &self,
        session: &Mutex<SessionState>,
        record: StreamRecord,
        cancel: &CancellationToken,
    ) {
        {
            let mut state = session.lock();
            if cancel.is_cancelled() {
                return;
            }
            let notifications = apply_record(&mut state, record);
            self.enqueue(notifications);
        }
        self.flush();
    }

    /// Queue notifications for delivery
    ///
    /// Must be called with the session lock held, right after the effects
    /// were applied.
    pub(crate) fn enqueue(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        self.outbox.lock().pending.extend(notifications);
    }

    /// Deliver queued notifications, unless another task already is
    ///
    /// Must be called without the session lock. When another task is
    /// draining, this returns at once and that task delivers the queued
    /// notifications after its current batch.
    pub(crate) fn flush(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.draining || outbox.pending.is_empty() {
                return;
            }
            outbox.draining = true;
        }
        let _reset = DrainReset(&self.outbox);

        loop {
            let batch: Vec<Notification> = {
                let mut outbox = self.outbox.lock();
                if outbox.pending.is_empty() {
                    outbox.draining = false;
                    return;
                }
                outbox.pending.drain(..).collect()
            };
            let handlers = self.handlers.read().clone();
            handlers.notify_all(&batch);
        }
    }
}

/// Releases the drain flag if a handler panics mid-delivery
struct DrainReset<'a>(&'a Mutex<Outbox>);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

/// Apply one record to the session, returning the notifications to deliver
///
/// Once the session is `Cancelled`, records are still written to the
/// timeline, registries and counters, but no transitions happen and no
/// notifications are produced.
pub(crate) fn apply_record(state: &mut SessionState, record: StreamRecord) -> Vec<Notification> {
    if let Some(id) = record.id.as_deref() {
        if state.replay.is_duplicate(id) {
            state.stats.duplicates_skipped += 1;
            tracing::debug!(
                session_id = %state.session_id,
                event_id = %id,
                event_type = %record.event_type,
                "skipping replayed event"
            );
            return Vec::new();
        }
    }

    state.stats.events_received += 1;
    let muted = state.state() == ConnectionState::Cancelled;
    let mut out = Vec::new();

    match StreamEvent::decode(&record) {
        Ok(event) => apply_event(state, event, record.id.as_deref(), muted, &mut out),
        Err(error) => {
            if muted {
                state.record(TimelineEntry::new(TimelineKind::Error, error.to_string()));
            } else {
                state.fault(TimelineKind::Error, error.to_string(), &mut out);
            }
        }
    }

    if let Some(id) = record.id {
        state.replay.mark_processed(id);
    }

    if muted { Vec::new() } else { out }
}

fn entry(
    kind: TimelineKind,
    content: impl Into<serde_json::Value>,
    event_id: Option<&str>,
) -> TimelineEntry {
    let entry = TimelineEntry::new(kind, content);
    match event_id {
        Some(id) => entry.with_metadata("event_id", id),
        None => entry,
    }
}

fn apply_event(
    state: &mut SessionState,
    event: StreamEvent,
    event_id: Option<&str>,
    muted: bool,
    out: &mut Vec<Notification>,
) {
    match event {
        StreamEvent::Connected { payload } => {
            state.record(entry(TimelineKind::Connection, payload, event_id));
        }
        StreamEvent::Heartbeat => {}
        StreamEvent::Thinking { delta } => {
            let cycle = &mut state.cycle;
            cycle.reasoning_started_at.get_or_insert_with(Instant::now);
            cycle.reasoning.push_str(&delta);
            cycle.reasoning_chars += delta.chars().count();
            let length = cycle.reasoning_chars;
            let thinking = entry(TimelineKind::Thinking, delta.clone(), event_id);
            state.record(thinking.with_metadata("length", length));
            if !muted && state.state() == ConnectionState::Connected {
                state.transition(ConnectionState::Processing, None, out);
            }
            out.push(Notification::ThinkingDelta(delta));
        }
        StreamEvent::Content { delta } => {
            let cycle = &mut state.cycle;
            cycle.finish_reasoning(Instant::now());
            cycle.content.push_str(&delta);
            cycle.content_chars += delta.chars().count();
            let length = cycle.content_chars;
            let content = entry(TimelineKind::Content, delta.clone(), event_id);
            state.record(content.with_metadata("length", length));
            if !muted && state.state() == ConnectionState::Connected {
                state.transition(ConnectionState::Processing, None, out);
            }
            out.push(Notification::ContentDelta(delta));
        }
        StreamEvent::Tool(update) => {
            let call = state.tools.upsert(update, Utc::now()).clone();
            state.record(tool_entry(&call, event_id));
            out.push(Notification::ToolUpdated(call));
        }
        StreamEvent::ToolExecutionStart {
            tool_call_id,
            progress,
        } => {
            let Some(call) = state
                .tools
                .mark_running(&tool_call_id, progress, Utc::now())
                .cloned()
            else {
                tracing::debug!(
                    tool_call_id = %tool_call_id,
                    "execution start for unknown tool call"
                );
                return;
            };
            state.record(tool_entry(&call, event_id));
            out.push(Notification::ToolUpdated(call));
        }
        StreamEvent::ToolExecutionComplete {
            tool_call_id,
            success,
            output,
        } => {
            let Some(call) = state
                .tools
                .mark_finished(&tool_call_id, success, output, Utc::now())
                .cloned()
            else {
                tracing::debug!(
                    tool_call_id = %tool_call_id,
                    "execution result for unknown tool call"
                );
                return;
            };
            state.stats.tools_executed += 1;
            let mut audit = tool_entry(&call, event_id);
            if let Some(duration) = call.duration() {
                audit = audit.with_metadata("duration_ms", duration.as_millis() as u64);
            }
            state.record(audit);
            out.push(Notification::ToolUpdated(call));
        }
        StreamEvent::Permission(payload) => {
            let request = permission_request(&state.session_id, payload);
            state.stats.permissions_requested += 1;
            state.record(
                entry(
                    TimelineKind::Permission,
                    serde_json::to_value(&request).unwrap_or_default(),
                    event_id,
                )
                .with_metadata("permission_id", request.id.clone())
                .with_metadata("decision", "pending"),
            );
            state.permissions.insert(request.clone());
            out.push(Notification::PermissionRequested(request));
        }
        StreamEvent::Complete {
            reason,
            reasoning,
            reasoning_duration,
        } => {
            let summary = Completion {
                reason,
                reasoning,
                reasoning_duration,
            };
            complete(state, summary, event_id, muted, out)
        }
        StreamEvent::Error { message, retry } => {
            error_event(state, message, retry, event_id, muted, out)
        }
        StreamEvent::Unknown { event_type } => {
            tracing::debug!(
                session_id = %state.session_id,
                event_type = %event_type,
                "ignoring unknown event type"
            );
        }
    }
}

/// What a `complete` event reports about the finished cycle
struct Completion {
    reason: Option<String>,
    reasoning: Option<String>,
    reasoning_duration: Option<std::time::Duration>,
}

/// Service-reported reasoning wins over what was accumulated locally
fn complete(
    state: &mut SessionState,
    summary: Completion,
    event_id: Option<&str>,
    muted: bool,
    out: &mut Vec<Notification>,
) {
    let now = Instant::now();
    let cycle = &mut state.cycle;
    cycle.finish_reasoning(now);
    if let Some(reasoning) = summary.reasoning {
        cycle.reasoning_chars = reasoning.chars().count();
        cycle.reasoning = reasoning;
    }
    if let Some(duration) = summary.reasoning_duration {
        cycle.reasoning_duration = Some(duration);
    }
    cycle.completed = true;
    cycle.in_flight = false;

    let mut audit = entry(TimelineKind::Control, "complete", event_id);
    if let Some(started) = cycle.started_at {
        let elapsed = now.duration_since(started);
        cycle.processing_time = Some(elapsed);
        let elapsed_ms = elapsed.as_millis() as u64;
        state.stats.total_processing_time_ms += elapsed_ms;
        audit = audit.with_metadata("processing_time_ms", elapsed_ms);
    }
    if let Some(reasoning) = state.cycle.reasoning_duration {
        audit = audit.with_metadata("reasoning_ms", reasoning.as_millis() as u64);
    }
    if let Some(reason) = summary.reason {
        audit = audit.with_metadata("reason", reason);
    }
    state.record(audit);
    state.reconnect.reset();

    if !muted {
        state.transition(ConnectionState::Completed, None, out);
    }
}

fn error_event(
    state: &mut SessionState,
    message: String,
    retry: Option<RetryHint>,
    event_id: Option<&str>,
    muted: bool,
    out: &mut Vec<Notification>,
) {
    let mut audit = entry(TimelineKind::Error, message.clone(), event_id);
    if let Some(hint) = retry {
        let signal = state.reconnect.record(hint);
        tracing::warn!(
            session_id = %state.session_id,
            retry_after_ms = signal.retry_after_ms,
            attempt = signal.attempt,
            max_attempts = signal.max_attempts,
            "rate limited by service"
        );
        audit = audit
            .with_metadata("retry_after_ms", signal.retry_after_ms)
            .with_metadata("attempt", signal.attempt)
            .with_metadata("max_attempts", signal.max_attempts);
        out.push(Notification::RateLimited(signal));
    }
    state.record(audit);

    if muted {
        return;
    }
    tracing::warn!(session_id = %state.session_id, error = %message, "error event from stream");
    state.cycle.in_flight = false;
    state.last_error = Some(message.clone());
    state.transition(ConnectionState::Error, Some(message), out);
}

fn permission_request(session_id: &str, payload: PermissionPayload) -> PermissionRequest {
    PermissionRequest {
        id: payload.id,
        session_id: payload
            .session_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| session_id.to_string()),
        tool_name: payload.tool_name,
        description: payload.description,
        action: payload.action,
        path: payload.path,
        params: payload.params,
        requested_at: Utc::now(),
    }
}

fn tool_entry(call: &ToolCall, event_id: Option<&str>) -> TimelineEntry {
    let content = serde_json::to_value(call).unwrap_or_else(|_| json!({ "id": call.id }));
    entry(TimelineKind::Tool, content, event_id)
        .with_metadata("tool_call_id", call.id.clone())
        .with_metadata("status", call.status.as_str())
}
