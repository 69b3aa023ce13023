//! Collaborator interface
//!
//! The coordinator never talks to the network itself. Everything it needs
//! from the remote service goes through [`SessionBackend`]: one long-lived
//! event stream plus four request/response calls.

pub mod channel;

pub use channel::{BackendCall, BackendOperation, ChannelBackend, StreamFeed};

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::TetherResult;
use crate::types::StreamRecord;

/// Stream of raw records; an `Err` item is a transport fault and ends consumption
pub type EventStream = Pin<Box<dyn Stream<Item = TetherResult<StreamRecord>> + Send>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Open the event stream, resuming after `last_event_id` when given
    async fn open_event_stream(
        &self,
        session_id: &str,
        last_event_id: Option<String>,
    ) -> TetherResult<EventStream>;

    async fn send_message(&self, session_id: &str, content: &str) -> TetherResult<()>;

    async fn cancel_processing(&self, session_id: &str) -> TetherResult<()>;

    async fn grant_permission(&self, request_id: &str) -> TetherResult<()>;

    async fn deny_permission(&self, request_id: &str) -> TetherResult<()>;
}
