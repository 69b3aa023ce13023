//! Command implementations

pub mod config;
pub mod send;
pub mod watch;

use anyhow::bail;
use std::sync::Arc;
use tether_core::{
    ConnectionState, PermissionRequest, ReconnectDecision, StateChange, StreamingCoordinator,
};
use tether_http::HttpBackend;
use tokio::sync::mpsc;

use crate::console::CliConsole;
use crate::settings::Settings;

/// Coordinator callbacks that need an answer from the command loop
#[derive(Debug)]
pub enum UiEvent {
    State(StateChange),
    Permission(PermissionRequest),
}

/// What woke the command loop
pub enum Step {
    Interrupted,
    Event(UiEvent),
    Closed,
}

/// A started coordinator plus the channel its callbacks feed
pub struct Session {
    pub coordinator: Arc<StreamingCoordinator>,
    events: mpsc::UnboundedReceiver<UiEvent>,
    console: Arc<CliConsole>,
}

impl Session {
    /// Build the HTTP backend, wire callbacks to the console and start streaming
    pub fn connect(
        settings: &Settings,
        session_id: &str,
        console: Arc<CliConsole>,
    ) -> anyhow::Result<Self> {
        let backend = Arc::new(HttpBackend::new(settings.http.clone())?);
        let coordinator = Arc::new(StreamingCoordinator::with_config(
            session_id,
            backend,
            settings.coordinator.clone(),
        ));
        let (tx, events) = mpsc::unbounded_channel();

        let out = console.clone();
        coordinator.on_thinking_delta(move |delta| out.thinking(delta));
        let out = console.clone();
        coordinator.on_content_delta(move |delta| out.content(delta));
        let out = console.clone();
        coordinator.on_tool_update(move |call| out.tool(call));
        let out = console.clone();
        coordinator.on_rate_limit(move |signal| {
            out.warn(&format!(
                "rate limited: retry after {}ms (attempt {}/{})",
                signal.retry_after_ms, signal.attempt, signal.max_attempts
            ))
        });

        let states = tx.clone();
        let out = console.clone();
        coordinator.on_state_change(move |change| {
            out.state(change);
            let _ = states.send(UiEvent::State(change.clone()));
        });
        coordinator.on_permission_request(move |request| {
            let _ = tx.send(UiEvent::Permission(request.clone()));
        });

        tracing::info!(session_id, base_url = %settings.http.base_url, "starting session");
        coordinator.start()?;

        Ok(Self {
            coordinator,
            events,
            console,
        })
    }

    /// Wait for the next callback event or Ctrl-C
    pub async fn next(&mut self, interruptible: bool) -> Step {
        tokio::select! {
            result = tokio::signal::ctrl_c(), if interruptible => match result {
                Ok(()) => Step::Interrupted,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                    Step::Closed
                }
            },
            event = self.events.recv() => match event {
                Some(event) => Step::Event(event),
                None => Step::Closed,
            },
        }
    }

    /// Handle a transition into `Error`
    ///
    /// With `reconnect` set and a pending rate-limit signal, waits the
    /// decided delay and starts the stream again from the last event id.
    /// Every other error ends the command.
    pub async fn recover(&self, change: &StateChange, reconnect: bool) -> anyhow::Result<()> {
        debug_assert_eq!(change.to, ConnectionState::Error);
        let message = change
            .message
            .clone()
            .unwrap_or_else(|| "session failed".to_string());

        if !reconnect || self.coordinator.pending_rate_limit().is_none() {
            bail!(message);
        }

        match self.coordinator.take_reconnect_decision() {
            Some(ReconnectDecision::Retry {
                delay,
                attempt,
                last_event_id,
            }) => {
                self.console.warn(&format!(
                    "reconnecting in {}ms (attempt {})",
                    delay.as_millis(),
                    attempt
                ));
                tracing::info!(attempt, last_event_id = ?last_event_id, "reconnecting");
                tokio::time::sleep(delay).await;
                self.coordinator.start()?;
                Ok(())
            }
            Some(ReconnectDecision::GiveUp { attempts, .. }) => {
                bail!("giving up after {} reconnect attempts: {}", attempts, message)
            }
            None => bail!(message),
        }
    }
}
