//! Streaming session coordinator
//!
//! [`StreamingCoordinator`] owns one session: it opens the event stream on a
//! background task, feeds every record through the [`EventDispatcher`], and
//! serves caller operations (send, cancel, permission decisions) from any
//! task. All mutable state sits behind one lock that is never held across
//! an `.await`; handlers run after the lock is released, one at a time and
//! in the order the effects were applied.

pub(crate) mod session;
pub mod state_machine;
pub mod stats;


pub use state_machine::{StateMachine, is_valid_transition};
pub use stats::StreamingStats;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::SessionBackend;
use crate::config::CoordinatorConfig;
use crate::error::{TetherError, TetherResult};
use crate::events::handlers::{
    DeltaHandler, EventHandlers, PermissionHandler, RateLimitHandler, StateHandler, ToolHandler,
};
use crate::events::{EventDispatcher, Notification};
use crate::permission::{PermissionDecision, PermissionRequest};
use crate::recovery::{RateLimitSignal, ReconnectDecision, ReconnectPolicy, ReconnectStrategy};
use crate::timeline::{TimelineEntry, TimelineKind};
use crate::tools::ToolCall;
use crate::types::{ConnectionState, StateChange};
use session::SessionState;

struct Listener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Coordinator for a single streaming session
pub struct StreamingCoordinator {
    session_id: String,
    backend: Arc<dyn SessionBackend>,
    config: CoordinatorConfig,
    session: Arc<Mutex<SessionState>>,
    handlers: Arc<RwLock<EventHandlers>>,
    dispatcher: EventDispatcher,
    listener: Mutex<Option<Listener>>,
}

impl StreamingCoordinator {
    pub fn new(session_id: impl Into<String>, backend: Arc<dyn SessionBackend>) -> Self {
        Self::with_config(session_id, backend, CoordinatorConfig::default())
    }

    pub fn with_config(
        session_id: impl Into<String>,
        backend: Arc<dyn SessionBackend>,
        config: CoordinatorConfig,
    ) -> Self {
        let session_id = session_id.into();
        let reconnect =
            ReconnectPolicy::with_backoff(config.backoff.clone(), config.default_max_attempts);
        let session = SessionState::new(session_id.clone(), config.seen_event_capacity, reconnect);
        let handlers = Arc::new(RwLock::new(EventHandlers::new()));

        Self {
            session_id,
            backend,
            config,
            session: Arc::new(Mutex::new(session)),
            dispatcher: EventDispatcher::new(handlers.clone()),
            handlers,
            listener: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Open the event stream on a background task
    ///
    /// Returns as soon as the session is `Connecting`. Calling it while the
    /// stream is already live does nothing. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self) -> TetherResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            TetherError::connection_with_context("no async runtime available", e.to_string())
        })?;

        let mut notes = Vec::new();
        let last_event_id = {
            let mut session = self.session.lock();
            let state = session.state();
            if state.is_stream_live() {
                tracing::debug!(
                    session_id = %self.session_id,
                    state = %state,
                    "start ignored, stream already live"
                );
                return Ok(());
            }
            session.reset_connection();
            session.stats.connection_started_at = Some(Utc::now());
            session.transition(ConnectionState::Connecting, None, &mut notes);
            self.dispatcher.enqueue(notes);
            // A superseded listener must not apply anything after `Connecting`
            if let Some(previous) = self.listener.lock().take() {
                previous.cancel.cancel();
            }
            session.replay.last_event_id().map(str::to_string)
        };

        tracing::info!(
            session_id = %self.session_id,
            last_event_id = ?last_event_id,
            "opening event stream"
        );

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(listen(
            ListenerContext {
                session_id: self.session_id.clone(),
                backend: self.backend.clone(),
                session: self.session.clone(),
                dispatcher: self.dispatcher.clone(),
                cancel: cancel.clone(),
            },
            last_event_id,
        ));
        if let Some(stale) = self.listener.lock().replace(Listener { cancel, handle }) {
            stale.cancel.cancel();
        }

        self.dispatcher.flush();
        Ok(())
    }

    /// Stop consuming the event stream and move to `Disconnected`
    ///
    /// Waits up to the configured stop timeout for the background task,
    /// then aborts it. Safe to call repeatedly.
    pub async fn stop(&self) {
        let listener = self.listener.lock().take();
        if let Some(Listener { cancel, mut handle }) = listener {
            cancel.cancel();
            if tokio::time::timeout(self.config.stop_timeout, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!(
                    session_id = %self.session_id,
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "event stream task did not stop in time, aborting"
                );
                handle.abort();
            }
        }

        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            session.cycle.in_flight = false;
            if session.transition(ConnectionState::Disconnected, None, &mut notes) {
                tracing::info!(session_id = %self.session_id, "session stopped");
            }
            self.dispatcher.enqueue(notes);
        }
        self.dispatcher.flush();
    }

    /// Send a message, opening a new cycle
    ///
    /// Fails with `NotConnected` unless the stream is open and no cycle is in
    /// flight. The reply arrives on the event stream.
    pub async fn send_message(&self, content: &str) -> TetherResult<()> {
        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            let state = session.state();
            let idle = match state {
                ConnectionState::Connected
                | ConnectionState::Completed
                | ConnectionState::Cancelled => true,
                ConnectionState::Processing => !session.cycle.in_flight,
                _ => false,
            };
            if !idle {
                return Err(TetherError::not_connected(format!(
                    "cannot send a message while {}",
                    if session.cycle.in_flight {
                        "a message is in flight"
                    } else {
                        state.as_str()
                    }
                )));
            }

            session.reset_cycle();
            session.cycle.in_flight = true;
            session.cycle.started_at = Some(Instant::now());
            session.transition(ConnectionState::Processing, None, &mut notes);
            session.record(
                TimelineEntry::new(TimelineKind::Message, content)
                    .with_metadata("chars", content.chars().count()),
            );
            self.dispatcher.enqueue(notes);
        }
        self.dispatcher.flush();

        match self.backend.send_message(&self.session_id, content).await {
            Ok(()) => {
                let sent = {
                    let mut session = self.session.lock();
                    session.stats.messages_sent += 1;
                    session.stats.messages_sent
                };
                tracing::debug!(
                    session_id = %self.session_id,
                    messages_sent = sent,
                    "message sent"
                );
                Ok(())
            }
            Err(e) => {
                self.collaborator_fault(&e);
                Err(e)
            }
        }
    }

    /// Ask the service to stop the current cycle
    ///
    /// Does nothing unless `Processing`.
    pub async fn cancel(&self) -> TetherResult<()> {
        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            if session.state() != ConnectionState::Processing {
                tracing::debug!(
                    session_id = %self.session_id,
                    state = %session.state(),
                    "cancel ignored, nothing processing"
                );
                return Ok(());
            }
            session.transition(ConnectionState::Paused, None, &mut notes);
            self.dispatcher.enqueue(notes);
        }
        self.dispatcher.flush();

        if let Err(e) = self.backend.cancel_processing(&self.session_id).await {
            self.collaborator_fault(&e);
            return Err(e);
        }

        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            session.cycle.in_flight = false;
            session.record(TimelineEntry::new(TimelineKind::Control, "cancelled"));
            session.transition(ConnectionState::Cancelled, None, &mut notes);
            self.dispatcher.enqueue(notes);
        }
        tracing::info!(session_id = %self.session_id, "processing cancelled");
        self.dispatcher.flush();
        Ok(())
    }

    pub async fn grant_permission(&self, permission_id: &str) -> TetherResult<()> {
        self.resolve_permission(permission_id, PermissionDecision::Granted)
            .await
    }

    pub async fn deny_permission(&self, permission_id: &str) -> TetherResult<()> {
        self.resolve_permission(permission_id, PermissionDecision::Denied)
            .await
    }

    async fn resolve_permission(
        &self,
        permission_id: &str,
        decision: PermissionDecision,
    ) -> TetherResult<()> {
        let request = self
            .session
            .lock()
            .permissions
            .reserve(permission_id)
            .ok_or_else(|| TetherError::permission_not_found(permission_id))?;

        let result = match decision {
            PermissionDecision::Granted => self.backend.grant_permission(permission_id).await,
            PermissionDecision::Denied => self.backend.deny_permission(permission_id).await,
        };

        let mut session = self.session.lock();
        match result {
            Ok(()) => {
                session.permissions.complete(permission_id);
                session.record(
                    TimelineEntry::new(TimelineKind::Permission, request.tool_name.clone())
                        .with_metadata("permission_id", permission_id)
                        .with_metadata("decision", decision.as_str()),
                );
                tracing::info!(
                    session_id = %self.session_id,
                    permission_id = %permission_id,
                    tool = %request.tool_name,
                    decision = decision.as_str(),
                    "permission resolved"
                );
                Ok(())
            }
            Err(e) => {
                session.permissions.release(permission_id);
                tracing::warn!(
                    session_id = %self.session_id,
                    permission_id = %permission_id,
                    error = %e,
                    "permission decision failed"
                );
                Err(e)
            }
        }
    }

    fn collaborator_fault(&self, error: &TetherError) {
        let mut notes = Vec::new();
        {
            let mut session = self.session.lock();
            session.fault(TimelineKind::Error, error.to_string(), &mut notes);
            self.dispatcher.enqueue(notes);
        }
        self.dispatcher.flush();
    }

    pub fn on_state_change<F>(&self, handler: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.handlers.write().on_state_change = Some(Arc::new(handler) as StateHandler);
    }

    pub fn on_thinking_delta<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handlers.write().on_thinking_delta = Some(Arc::new(handler) as DeltaHandler);
    }

    pub fn on_content_delta<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handlers.write().on_content_delta = Some(Arc::new(handler) as DeltaHandler);
    }

    pub fn on_tool_update<F>(&self, handler: F)
    where
        F: Fn(&ToolCall) + Send + Sync + 'static,
    {
        self.handlers.write().on_tool_update = Some(Arc::new(handler) as ToolHandler);
    }

    pub fn on_permission_request<F>(&self, handler: F)
    where
        F: Fn(&PermissionRequest) + Send + Sync + 'static,
    {
        self.handlers.write().on_permission_request =
            Some(Arc::new(handler) as PermissionHandler);
    }

    pub fn on_rate_limit<F>(&self, handler: F)
    where
        F: Fn(&RateLimitSignal) + Send + Sync + 'static,
    {
        self.handlers.write().on_rate_limit = Some(Arc::new(handler) as RateLimitHandler);
    }

    pub fn state(&self) -> ConnectionState {
        self.session.lock().state()
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.session.lock().timeline.entries().to_vec()
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.session.lock().tools.snapshot()
    }

    pub fn tool_call(&self, id: &str) -> TetherResult<ToolCall> {
        self.session
            .lock()
            .tools
            .get(id)
            .cloned()
            .ok_or_else(|| TetherError::tool_not_found(id))
    }

    pub fn pending_permissions(&self) -> Vec<PermissionRequest> {
        self.session.lock().permissions.snapshot()
    }

    pub fn stats(&self) -> StreamingStats {
        self.session.lock().stats.clone()
    }

    pub fn content(&self) -> String {
        self.session.lock().cycle.content.clone()
    }

    pub fn reasoning(&self) -> String {
        self.session.lock().cycle.reasoning.clone()
    }

    /// Reasoning phase length of the current cycle, once it has ended
    pub fn reasoning_duration(&self) -> Option<std::time::Duration> {
        self.session.lock().cycle.reasoning_duration
    }

    /// Send-to-complete time of the current cycle
    pub fn processing_time(&self) -> Option<std::time::Duration> {
        self.session.lock().cycle.processing_time
    }

    pub fn is_completed(&self) -> bool {
        self.session.lock().cycle.completed
    }

    pub fn is_processing(&self) -> bool {
        self.session.lock().cycle.in_flight
    }

    pub fn last_error(&self) -> Option<String> {
        self.session.lock().last_error.clone()
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.session.lock().replay.last_event_id().map(str::to_string)
    }

    pub fn running_tool_count(&self) -> usize {
        self.session.lock().tools.running_tool_count()
    }

    pub fn pending_permission_count(&self) -> usize {
        self.session.lock().permissions.pending_permission_count()
    }

    /// The rate-limit signal waiting for a decision, if any
    pub fn pending_rate_limit(&self) -> Option<RateLimitSignal> {
        self.session.lock().reconnect.pending().copied()
    }

    /// Consume the pending rate-limit signal and decide how to resume
    ///
    /// The coordinator never reconnects by itself; on `Retry` the caller
    /// waits the delay and calls [`start`](Self::start) again.
    pub fn take_reconnect_decision(&self) -> Option<ReconnectDecision> {
        let mut session = self.session.lock();
        let last_event_id = session.replay.last_event_id().map(str::to_string);
        let decision = session.reconnect.take_decision(last_event_id);
        if let Some(decision) = &decision {
            tracing::info!(
                session_id = %self.session_id,
                decision = ?decision,
                "reconnect decision"
            );
        }
        decision
    }

    pub fn set_reconnect_strategy(&self, strategy: Arc<dyn ReconnectStrategy>) {
        self.session.lock().reconnect.set_strategy(strategy);
    }
}

impl Drop for StreamingCoordinator {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.cancel.cancel();
            listener.handle.abort();
        }
    }
}

struct ListenerContext {
    session_id: String,
    backend: Arc<dyn SessionBackend>,
    session: Arc<Mutex<SessionState>>,
    dispatcher: EventDispatcher,
    cancel: CancellationToken,
}

impl ListenerContext {
    /// Enter `Error` unless this listener has been superseded or stopped
    fn fault(&self, message: String) {
        let mut notes: Vec<Notification> = Vec::new();
        {
            let mut session = self.session.lock();
            if self.cancel.is_cancelled() {
                return;
            }
            session.fault(TimelineKind::Connection, message, &mut notes);
            self.dispatcher.enqueue(notes);
        }
        self.dispatcher.flush();
    }
}

async fn listen(ctx: ListenerContext, last_event_id: Option<String>) {
    let opened = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return,
        opened = ctx.backend.open_event_stream(&ctx.session_id, last_event_id) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(TetherError::Cancelled) => return,
        Err(e) => {
            tracing::error!(
                session_id = %ctx.session_id,
                error = %e,
                "failed to open event stream"
            );
            ctx.fault(format!("failed to open event stream: {}", e));
            return;
        }
    };

    let mut notes = Vec::new();
    {
        let mut session = ctx.session.lock();
        if ctx.cancel.is_cancelled() {
            return;
        }
        session.transition(ConnectionState::Connected, None, &mut notes);
        ctx.dispatcher.enqueue(notes);
    }
    tracing::info!(session_id = %ctx.session_id, "event stream connected");
    ctx.dispatcher.flush();

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(record)) => {
                ctx.dispatcher.dispatch(&ctx.session, record, &ctx.cancel);
            }
            Some(Err(e)) => {
                tracing::error!(session_id = %ctx.session_id, error = %e, "event stream fault");
                ctx.fault(e.to_string());
                break;
            }
            None => {
                tracing::warn!(session_id = %ctx.session_id, "event stream ended");
                ctx.fault("event stream ended unexpectedly".to_string());
                break;
            }
        }
    }

    tracing::debug!(session_id = %ctx.session_id, "event stream task finished");
}
