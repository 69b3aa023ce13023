//! End-to-end session flows against the in-process backend

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{
    ChannelBackend, ConnectionState, CoordinatorConfig, StreamingCoordinator, TimelineKind,
};

async fn wait_for(coordinator: &StreamingCoordinator, state: ConnectionState) {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        while coordinator.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "never reached {}", state);
}

#[tokio::test]
async fn test_events_are_recorded_in_arrival_order() {
    let backend = Arc::new(ChannelBackend::new());
    let feed = backend.push_stream();
    let coordinator = StreamingCoordinator::new("sess-order", backend.clone());
    coordinator.start().unwrap();
    wait_for(&coordinator, ConnectionState::Connected).await;

    let callbacks = Arc::new(Mutex::new(Vec::new()));
    let thinking = callbacks.clone();
    coordinator.on_thinking_delta(move |d| thinking.lock().push(format!("thinking:{}", d)));
    let content = callbacks.clone();
    coordinator.on_content_delta(move |d| content.lock().push(format!("content:{}", d)));
    let tools = callbacks.clone();
    coordinator.on_tool_update(move |c| tools.lock().push(format!("tool:{}", c.id)));

    coordinator.send_message("go").await.unwrap();
    feed.event("heartbeat", json!({}));
    feed.event("thinking", json!({"content": "a"}));
    feed.event("tool", json!({"id": "t1", "name": "grep", "status": "running"}));
    feed.event("content", json!({"content": "b"}));
    feed.event("mystery", json!({}));
    feed.event("content", json!({"content": "c"}));
    feed.event("complete", json!({}));
    wait_for(&coordinator, ConnectionState::Completed).await;

    assert_eq!(coordinator.stats().events_received, 7);
    assert_eq!(
        *callbacks.lock(),
        vec!["thinking:a", "tool:t1", "content:b", "content:c"]
    );
    let kinds: Vec<_> = coordinator.timeline().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TimelineKind::Message,
            TimelineKind::Thinking,
            TimelineKind::Tool,
            TimelineKind::Content,
            TimelineKind::Content,
            TimelineKind::Control,
        ]
    );
    assert_eq!(coordinator.running_tool_count(), 1);
}

#[tokio::test]
async fn test_counters_survive_cycles_and_restarts() {
    let backend = Arc::new(ChannelBackend::new());
    let first = backend.push_stream();
    let config = CoordinatorConfig::default().with_stop_timeout(Duration::from_millis(200));
    let coordinator = StreamingCoordinator::with_config("sess-cycles", backend.clone(), config);

    coordinator.start().unwrap();
    wait_for(&coordinator, ConnectionState::Connected).await;
    for i in 0..2 {
        coordinator.send_message(&format!("message {}", i)).await.unwrap();
        first.event_with_id(&format!("c{}", i), "content", json!("x"));
        first.event_with_id(&format!("d{}", i), "complete", json!({}));
        wait_for(&coordinator, ConnectionState::Completed).await;
    }
    assert_eq!(coordinator.content(), "x");

    coordinator.stop().await;
    assert_eq!(coordinator.state(), ConnectionState::Disconnected);

    let second = backend.push_stream();
    coordinator.start().unwrap();
    wait_for(&coordinator, ConnectionState::Connected).await;
    assert!(coordinator.timeline().is_empty());
    assert_eq!(coordinator.last_event_id().as_deref(), Some("d1"));

    coordinator.send_message("again").await.unwrap();
    second.event_with_id("d1", "complete", json!({}));
    second.event_with_id("c2", "content", json!("y"));
    second.event_with_id("d2", "complete", json!({}));
    wait_for(&coordinator, ConnectionState::Completed).await;

    let stats = coordinator.stats();
    assert_eq!(stats.messages_sent, 3);
    assert_eq!(stats.events_received, 6);
    assert_eq!(stats.duplicates_skipped, 1);
    assert_eq!(coordinator.content(), "y");
}
