use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::apply_record;
use super::*;
use crate::coordinator::session::SessionState;
use crate::recovery::{BackoffConfig, ReconnectPolicy};
use crate::timeline::TimelineKind;
use crate::tools::ToolStatus;
use crate::types::{ConnectionState, StateChange};

fn session() -> SessionState {
    SessionState::new(
        "sess-1",
        16,
        ReconnectPolicy::with_backoff(BackoffConfig::default().jitter(false), 5),
    )
}

fn connected() -> SessionState {
    let mut state = session();
    state.machine.transition(ConnectionState::Connecting, None);
    state.machine.transition(ConnectionState::Connected, None);
    state
}

fn record(event_type: &str, payload: serde_json::Value) -> StreamRecord {
    StreamRecord::new(event_type, payload)
}

fn state_changes(notes: &[Notification]) -> Vec<(ConnectionState, ConnectionState)> {
    notes
        .iter()
        .filter_map(|n| match n {
            Notification::StateChanged(StateChange { from, to, .. }) => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_decode_aliases() {
    assert_eq!(
        StreamEvent::decode(&record("ping", json!({}))).unwrap(),
        StreamEvent::Heartbeat
    );
    assert_eq!(
        StreamEvent::decode(&record("done", json!({"reason": "end_turn"}))).unwrap(),
        StreamEvent::Complete {
            reason: Some("end_turn".into()),
            reasoning: None,
            reasoning_duration: None,
        }
    );
    assert_eq!(
        StreamEvent::decode(&record("content", json!("bare"))).unwrap(),
        StreamEvent::Content {
            delta: "bare".into()
        }
    );
    assert_eq!(
        StreamEvent::decode(&record("thinking", json!({"delta": "hmm"}))).unwrap(),
        StreamEvent::Thinking {
            delta: "hmm".into()
        }
    );
}

#[test]
fn test_decode_execution_output() {
    let ok = StreamEvent::decode(&record(
        "tool_execution_complete",
        json!({"tool_call_id": "t1", "result": "42"}),
    ))
    .unwrap();
    assert_eq!(
        ok,
        StreamEvent::ToolExecutionComplete {
            tool_call_id: "t1".into(),
            success: true,
            output: "42".into(),
        }
    );

    let failed = StreamEvent::decode(&record(
        "tool_execution_complete",
        json!({"id": "t1", "success": false}),
    ))
    .unwrap();
    assert_eq!(
        failed,
        StreamEvent::ToolExecutionComplete {
            tool_call_id: "t1".into(),
            success: false,
            output: "tool execution failed".into(),
        }
    );
}

#[test]
fn test_decode_error_retry_hint() {
    let event = StreamEvent::decode(&record(
        "error",
        json!({"error": {"message": "slow down"}, "retry_after": 5000, "attempt": 1}),
    ))
    .unwrap();
    match event {
        StreamEvent::Error { message, retry } => {
            assert_eq!(message, "slow down");
            let hint = retry.unwrap();
            assert_eq!(hint.retry_after_ms, 5000);
            assert_eq!(hint.attempt, Some(1));
            assert_eq!(hint.max_attempts, None);
        }
        other => panic!("unexpected event {:?}", other),
    }

    // A zero delay is a plain error, not a rate limit
    let event = StreamEvent::decode(&record(
        "error",
        json!({"error": "boom", "retry_after": 0}),
    ))
    .unwrap();
    assert!(matches!(event, StreamEvent::Error { retry: None, .. }));
}

#[test]
fn test_decode_tool_input_encoded_as_string() {
    let payload = json!({
        "id": "t1",
        "name": "grep",
        "status": "running",
        "input": "{\"pattern\":\"x\"}",
    });
    let event = StreamEvent::decode(&record("tool", payload)).unwrap();
    match event {
        StreamEvent::Tool(update) => {
            let parameters = update.parameters.unwrap();
            assert_eq!(parameters.get("pattern"), Some(&json!("x")));
        }
        other => panic!("unexpected event {:?}", other),
    }

    for input in ["[1, 2]", "not json"] {
        let payload = json!({"id": "t1", "input": input});
        assert!(StreamEvent::decode(&record("tool", payload)).is_err());
    }
}

#[test]
fn test_tool_with_string_input_is_registered() {
    let mut state = connected();
    let payload = json!({
        "id": "t1",
        "name": "grep",
        "status": "running",
        "input": "{\"pattern\":\"x\"}",
    });
    let notes = apply_record(&mut state, record("tool", payload));

    assert_eq!(state.state(), ConnectionState::Connected);
    assert_eq!(state.tools.len(), 1);
    assert_eq!(notes.len(), 1);
    let call = state.tools.get("t1").unwrap();
    assert_eq!(call.parameters.get("pattern"), Some(&json!("x")));
    assert_eq!(call.description, "Executing grep");
}

#[test]
fn test_decode_permission_params_encoded_as_string() {
    let event = StreamEvent::decode(&record(
        "permission",
        json!({"id": "p1", "tool_name": "write", "params": "{\"mode\":\"append\"}"}),
    ))
    .unwrap();
    match event {
        StreamEvent::Permission(payload) => {
            assert_eq!(payload.params.get("mode"), Some(&json!("append")));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_decode_rejects_missing_fields() {
    assert!(StreamEvent::decode(&record("content", json!({"other": 1}))).is_err());
    assert!(StreamEvent::decode(&record("tool", json!({"name": "read"}))).is_err());
    assert!(StreamEvent::decode(&record("permission", json!({"tool_name": "x"}))).is_err());
}

#[test]
fn test_unknown_event_type_is_ignored() {
    let mut state = connected();
    let notes = apply_record(&mut state, record("telemetry", json!({"x": 1})));
    assert!(notes.is_empty());
    assert!(state.timeline.is_empty());
    assert_eq!(state.stats.events_received, 1);
    assert_eq!(state.state(), ConnectionState::Connected);
}

#[test]
fn test_thinking_then_content_then_complete() {
    let mut state = connected();
    state.cycle.in_flight = true;

    let notes = apply_record(&mut state, record("thinking", json!({"content": "Let me "})));
    assert_eq!(
        state_changes(&notes),
        vec![(ConnectionState::Connected, ConnectionState::Processing)]
    );
    assert_eq!(notes.last(), Some(&Notification::ThinkingDelta("Let me ".into())));

    apply_record(&mut state, record("thinking", json!({"content": "think"})));
    let notes = apply_record(&mut state, record("content", json!({"content": "Héllo"})));
    assert!(state_changes(&notes).is_empty());
    assert_eq!(notes, vec![Notification::ContentDelta("Héllo".into())]);

    assert_eq!(state.cycle.reasoning, "Let me think");
    assert_eq!(state.cycle.content, "Héllo");
    assert!(state.cycle.reasoning_duration.is_some());

    let content = state.timeline.of_kind(TimelineKind::Content).next().unwrap();
    assert_eq!(content.metadata.get("length"), Some(&json!(5)));
    let thinking: Vec<_> = state.timeline.of_kind(TimelineKind::Thinking).collect();
    assert_eq!(thinking[1].metadata.get("length"), Some(&json!(12)));

    let notes = apply_record(&mut state, record("complete", json!({})));
    assert_eq!(
        state_changes(&notes),
        vec![(ConnectionState::Processing, ConnectionState::Completed)]
    );
    assert!(state.cycle.completed);
    assert!(!state.cycle.in_flight);
    assert_eq!(state.timeline.last().unwrap().kind, TimelineKind::Control);
    assert_eq!(state.stats.events_received, 4);
}

#[test]
fn test_complete_prefers_reported_reasoning() {
    let mut state = connected();
    state.cycle.in_flight = true;
    apply_record(&mut state, record("thinking", json!({"content": "local"})));

    let done = json!({"reasoning": "final answer", "reasoning_duration": 1500});
    apply_record(&mut state, record("complete", done));
    assert_eq!(state.cycle.reasoning, "final answer");
    assert_eq!(state.cycle.reasoning_chars, 12);
    assert_eq!(
        state.cycle.reasoning_duration,
        Some(Duration::from_millis(1500))
    );

    let mut state = connected();
    state.cycle.in_flight = true;
    apply_record(&mut state, record("thinking", json!({"content": "local"})));
    let done = json!({"reasoning": "", "reasoningDuration": -1});
    apply_record(&mut state, record("complete", done));
    assert_eq!(state.cycle.reasoning, "local");
    assert!(state.cycle.reasoning_duration.is_some());
    assert!(state.cycle.completed);
}

#[test]
fn test_content_while_not_connected_keeps_state() {
    let mut state = session();
    let notes = apply_record(&mut state, record("content", json!("early")));
    assert_eq!(state.state(), ConnectionState::Disconnected);
    assert_eq!(notes, vec![Notification::ContentDelta("early".into())]);
    assert_eq!(state.cycle.content, "early");
}

#[test]
fn test_tool_lifecycle() {
    let mut state = connected();
    apply_record(
        &mut state,
        record(
            "tool",
            json!({
                "id": "t1",
                "name": "read_file",
                "status": "pending",
                "parameters": {"path": "a.rs"},
            }),
        ),
    );
    assert_eq!(state.tools.get("t1").unwrap().status, ToolStatus::Pending);

    let notes = apply_record(
        &mut state,
        record("tool_execution_start", json!({"tool_call_id": "t1"})),
    );
    assert!(matches!(&notes[0], Notification::ToolUpdated(call) if call.is_running()));
    assert_eq!(state.tools.running_tool_count(), 1);

    apply_record(
        &mut state,
        record(
            "tool_execution_complete",
            json!({"tool_call_id": "t1", "success": true, "result": "fn main() {}"}),
        ),
    );
    let call = state.tools.get("t1").unwrap();
    assert_eq!(call.status, ToolStatus::Completed);
    assert_eq!(call.result.as_deref(), Some("fn main() {}"));
    assert!(call.duration().is_some());
    assert_eq!(state.tools.running_tool_count(), 0);
    assert_eq!(state.stats.tools_executed, 1);

    let tool_entries: Vec<_> = state.timeline.of_kind(TimelineKind::Tool).collect();
    assert_eq!(tool_entries.len(), 3);
    assert_eq!(tool_entries[2].metadata_str("status"), Some("completed"));
    assert!(tool_entries[2].metadata.contains_key("duration_ms"));
}

#[test]
fn test_execution_for_unknown_tool_is_noop() {
    let mut state = connected();
    let notes = apply_record(
        &mut state,
        record("tool_execution_complete", json!({"tool_call_id": "ghost"})),
    );
    assert!(notes.is_empty());
    assert!(state.timeline.is_empty());
    assert!(state.tools.is_empty());
    assert_eq!(state.stats.tools_executed, 0);
    assert_eq!(state.stats.events_received, 1);
}

#[test]
fn test_permission_request_is_registered() {
    let mut state = connected();
    let notes = apply_record(
        &mut state,
        record(
            "permission",
            json!({"id": "p1", "tool_name": "bash", "action": "execute", "params": {"cmd": "ls"}}),
        ),
    );
    match &notes[..] {
        [Notification::PermissionRequested(request)] => {
            assert_eq!(request.id, "p1");
            assert_eq!(request.session_id, "sess-1");
            assert_eq!(request.params.get("cmd"), Some(&json!("ls")));
        }
        other => panic!("unexpected notifications {:?}", other),
    }
    assert_eq!(state.permissions.pending_permission_count(), 1);
    assert_eq!(state.stats.permissions_requested, 1);
    let entry = state.timeline.last().unwrap();
    assert_eq!(entry.kind, TimelineKind::Permission);
    assert_eq!(entry.metadata_str("decision"), Some("pending"));
}

#[test]
fn test_error_event_with_rate_limit() {
    let mut state = connected();
    state.cycle.in_flight = true;
    let notes = apply_record(
        &mut state,
        record("error", json!({"message": "rate limited", "retry_after_ms": 1500})),
    );

    let signal = match &notes[0] {
        Notification::RateLimited(signal) => *signal,
        other => panic!("unexpected notification {:?}", other),
    };
    assert_eq!(signal.retry_after_ms, 1500);
    assert_eq!(signal.attempt, 1);
    assert_eq!(signal.max_attempts, 5);
    assert_eq!(
        state_changes(&notes),
        vec![(ConnectionState::Connected, ConnectionState::Error)]
    );
    assert_eq!(state.last_error.as_deref(), Some("rate limited"));
    assert!(!state.cycle.in_flight);
    assert_eq!(state.reconnect.pending(), Some(&signal));

    let entry = state.timeline.last().unwrap();
    assert_eq!(entry.kind, TimelineKind::Error);
    assert_eq!(entry.metadata.get("retry_after_ms"), Some(&json!(1500)));
}

#[test]
fn test_malformed_payload_faults_session() {
    let mut state = connected();
    let notes = apply_record(&mut state, record("tool", json!({"status": "running"})));
    assert_eq!(state.state(), ConnectionState::Error);
    assert_eq!(notes.len(), 1);
    assert!(state.last_error.as_deref().unwrap().contains("tool"));
    assert_eq!(state.timeline.last().unwrap().metadata.get("fault"), Some(&json!(true)));
}

#[test]
fn test_duplicate_ids_are_skipped() {
    let mut state = connected();
    let first = record("content", json!("a")).with_id("e1");
    apply_record(&mut state, first.clone());
    let notes = apply_record(&mut state, first);

    assert!(notes.is_empty());
    assert_eq!(state.cycle.content, "a");
    assert_eq!(state.stats.events_received, 1);
    assert_eq!(state.stats.duplicates_skipped, 1);
    assert_eq!(state.replay.last_event_id(), Some("e1"));
    assert_eq!(state.timeline.last().unwrap().metadata_str("event_id"), Some("e1"));
}

#[test]
fn test_records_after_cancel_are_muted() {
    let mut state = connected();
    let mut sink = Vec::new();
    state.transition(ConnectionState::Processing, None, &mut sink);
    state.transition(ConnectionState::Paused, None, &mut sink);
    state.transition(ConnectionState::Cancelled, None, &mut sink);

    let notes = apply_record(&mut state, record("content", json!("late")));
    assert!(notes.is_empty());
    assert_eq!(state.cycle.content, "late");

    let notes = apply_record(&mut state, record("complete", json!({})));
    assert!(notes.is_empty());
    assert_eq!(state.state(), ConnectionState::Cancelled);

    let notes = apply_record(&mut state, record("error", json!("boom")));
    assert!(notes.is_empty());
    assert_eq!(state.state(), ConnectionState::Cancelled);
    assert_eq!(state.stats.events_received, 3);
    assert_eq!(state.timeline.len(), 3);
}

#[test]
fn test_complete_resets_reconnect_attempts() {
    let mut state = connected();
    state.reconnect.record(crate::recovery::RetryHint {
        retry_after_ms: 10,
        attempt: Some(2),
        max_attempts: None,
    });
    state.cycle.in_flight = true;
    apply_record(&mut state, record("content", json!("x")));
    apply_record(&mut state, record("complete", json!({})));
    assert_eq!(state.reconnect.attempts(), 0);
    assert!(state.reconnect.pending().is_none());
}

#[test]
fn test_reentrant_flush_keeps_queue_order() {
    let handlers = Arc::new(RwLock::new(EventHandlers::new()));
    let dispatcher = EventDispatcher::new(handlers.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (inner, sink) = (dispatcher.clone(), seen.clone());
    handlers.write().on_content_delta = Some(Arc::new(move |delta: &str| {
        sink.lock().push(delta.to_string());
        if delta == "first" {
            inner.enqueue(vec![Notification::ContentDelta("nested".into())]);
            inner.flush();
            sink.lock().push("after nested flush".to_string());
        }
    }));

    dispatcher.enqueue(vec![
        Notification::ContentDelta("first".into()),
        Notification::ContentDelta("second".into()),
    ]);
    dispatcher.flush();
    assert_eq!(
        *seen.lock(),
        vec!["first", "after nested flush", "second", "nested"]
    );

    // The drain flag is released once the queue is empty
    dispatcher.enqueue(vec![Notification::ContentDelta("later".into())]);
    dispatcher.flush();
    assert_eq!(seen.lock().last().map(String::as_str), Some("later"));
}
