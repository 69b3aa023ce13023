//! In-process backend fed through channels
//!
//! Each call to [`ChannelBackend::push_stream`] queues one event stream for
//! the next `open_event_stream`, and hands back a [`StreamFeed`] to write
//! records into it. Dropping the feed ends the stream. Every collaborator
//! call is recorded so hosts and tests can inspect what the coordinator did.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{EventStream, SessionBackend};
use crate::error::{TetherError, TetherResult};
use crate::types::StreamRecord;

/// Collaborator operations, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    OpenEventStream,
    SendMessage,
    CancelProcessing,
    GrantPermission,
    DenyPermission,
}

impl BackendOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenEventStream => "open_event_stream",
            Self::SendMessage => "send_message",
            Self::CancelProcessing => "cancel_processing",
            Self::GrantPermission => "grant_permission",
            Self::DenyPermission => "deny_permission",
        }
    }
}

/// A recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    OpenEventStream {
        session_id: String,
        last_event_id: Option<String>,
    },
    SendMessage {
        session_id: String,
        content: String,
    },
    CancelProcessing {
        session_id: String,
    },
    GrantPermission {
        request_id: String,
    },
    DenyPermission {
        request_id: String,
    },
}

type RecordSender = mpsc::UnboundedSender<TetherResult<StreamRecord>>;
type RecordReceiver = mpsc::UnboundedReceiver<TetherResult<StreamRecord>>;

/// Writer half of a queued event stream
#[derive(Debug, Clone)]
pub struct StreamFeed {
    tx: RecordSender,
}

impl StreamFeed {
    /// Push a record; returns false once the consumer is gone
    pub fn send(&self, record: StreamRecord) -> bool {
        self.tx.send(Ok(record)).is_ok()
    }

    pub fn event(&self, event_type: &str, payload: Value) -> bool {
        self.send(StreamRecord::new(event_type, payload))
    }

    pub fn event_with_id(&self, id: &str, event_type: &str, payload: Value) -> bool {
        self.send(StreamRecord::new(event_type, payload).with_id(id))
    }

    /// Push a transport fault, which ends consumption on the other side
    pub fn fault(&self, message: impl Into<String>) -> bool {
        self.tx.send(Err(TetherError::connection(message))).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    streams: VecDeque<RecordReceiver>,
    calls: Vec<BackendCall>,
    failures: HashMap<BackendOperation, VecDeque<String>>,
}

#[derive(Debug, Default)]
pub struct ChannelBackend {
    state: Mutex<ChannelState>,
    latency: Option<Duration>,
}

impl ChannelBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every request/response call, to widen race windows
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a stream for the next open and return its writer
    pub fn push_stream(&self) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().streams.push_back(rx);
        StreamFeed { tx }
    }

    /// Make the next call of `operation` fail with `message`
    pub fn fail_next(&self, operation: BackendOperation, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(message.into());
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: BackendOperation) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    async fn call(&self, call: BackendCall) -> TetherResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.record(call)
    }

    fn record(&self, call: BackendCall) -> TetherResult<()> {
        let operation = call.operation();
        let mut state = self.state.lock();
        state.calls.push(call);
        match state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(message) => Err(TetherError::collaborator(operation.as_str(), message)),
            None => Ok(()),
        }
    }
}

impl BackendCall {
    pub fn operation(&self) -> BackendOperation {
        match self {
            Self::OpenEventStream { .. } => BackendOperation::OpenEventStream,
            Self::SendMessage { .. } => BackendOperation::SendMessage,
            Self::CancelProcessing { .. } => BackendOperation::CancelProcessing,
            Self::GrantPermission { .. } => BackendOperation::GrantPermission,
            Self::DenyPermission { .. } => BackendOperation::DenyPermission,
        }
    }
}

#[async_trait]
impl SessionBackend for ChannelBackend {
    async fn open_event_stream(
        &self,
        session_id: &str,
        last_event_id: Option<String>,
    ) -> TetherResult<EventStream> {
        self.record(BackendCall::OpenEventStream {
            session_id: session_id.to_string(),
            last_event_id,
        })?;
        let rx = self.state.lock().streams.pop_front().ok_or_else(|| {
            TetherError::collaborator(
                BackendOperation::OpenEventStream.as_str(),
                "no event stream queued",
            )
        })?;
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn send_message(&self, session_id: &str, content: &str) -> TetherResult<()> {
        self.call(BackendCall::SendMessage {
            session_id: session_id.to_string(),
            content: content.to_string(),
        })
        .await
    }

    async fn cancel_processing(&self, session_id: &str) -> TetherResult<()> {
        self.call(BackendCall::CancelProcessing {
            session_id: session_id.to_string(),
        })
        .await
    }

    async fn grant_permission(&self, request_id: &str) -> TetherResult<()> {
        self.call(BackendCall::GrantPermission {
            request_id: request_id.to_string(),
        })
        .await
    }

    async fn deny_permission(&self, request_id: &str) -> TetherResult<()> {
        self.call(BackendCall::DenyPermission {
            request_id: request_id.to_string(),
        })
        .await
    }
}
