//! Connection lifecycle transition table

use crate::types::{ConnectionState, StateChange};

/// Whether `from -> to` is a legal transition
///
/// Besides the core edges, a fresh `start()` may leave any finished state
/// and `send_message` may open a new cycle from an idle connection.
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    match (from, to) {
        (_, Error) | (_, Disconnected) => true,
        (Disconnected | Completed | Cancelled | Error, Connecting) => true,
        (Connecting, Connected) => true,
        (Connected | Completed | Cancelled, Processing) => true,
        (Processing, Completed) | (Processing, Paused) => true,
        (Paused, Cancelled) => true,
        _ => false,
    }
}

/// Holder of the single current state
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: ConnectionState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `to`, returning the change to report
    ///
    /// Same-state and illegal transitions return `None` and leave the state
    /// untouched.
    pub fn transition(
        &mut self,
        to: ConnectionState,
        message: Option<String>,
    ) -> Option<StateChange> {
        let from = self.state;
        if from == to {
            return None;
        }
        if !is_valid_transition(from, to) {
            tracing::debug!(from = %from, to = %to, "ignoring invalid state transition");
            return None;
        }
        self.state = to;
        tracing::debug!(from = %from, to = %to, "connection state changed");
        Some(StateChange { from, to, message })
    }
}
