//! The top-level crate exposes the coordinator and the HTTP transport

use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tether::backend::BackendCall;
use tether::{ChannelBackend, ConnectionState, HttpBackendConfig, StreamingCoordinator};

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
async fn test_permission_round_trip_through_facade() {
    let backend = Arc::new(ChannelBackend::new());
    let feed = backend.push_stream();
    let coordinator = StreamingCoordinator::new("sess-facade", backend.clone());
    coordinator.start().unwrap();
    wait_for(&coordinator, ConnectionState::Connected).await;

    coordinator.send_message("write the file").await.unwrap();
    feed.event(
        "permission",
        json!({"id": "perm-1", "tool_name": "write", "action": "write", "path": "/tmp/out"}),
    );
    let registered = tokio::time::timeout(Duration::from_secs(2), async {
        while coordinator.pending_permission_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(registered.is_ok());

    coordinator.grant_permission("perm-1").await.unwrap();
    assert_eq!(coordinator.pending_permission_count(), 0);
    assert!(backend.calls().contains(&BackendCall::GrantPermission {
        request_id: "perm-1".to_string()
    }));

    feed.event("complete", json!({}));
    wait_for(&coordinator, ConnectionState::Completed).await;
    coordinator.stop().await;
    assert_eq!(coordinator.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_http_module_decodes_sse_bytes() {
    let parts: Vec<Result<&'static [u8], String>> = vec![
        Ok(&b"id: 9\nevent: thinking\ndata: {\"content\":\"hm\"}\n\n"[..]),
    ];
    let records: Vec<_> = tether::http::sse_record_stream(futures::stream::iter(parts))
        .collect()
        .await;

    let record = records[0].as_ref().unwrap();
    assert_eq!(record.id.as_deref(), Some("9"));
    assert_eq!(record.event_type, "thinking");

    let config = HttpBackendConfig::new("http://localhost:1");
    assert_eq!(config.events_url("a"), "http://localhost:1/sessions/a/events");
}
