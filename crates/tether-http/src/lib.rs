//! HTTP/SSE backend for Tether
//!
//! [`HttpBackend`] implements [`tether_core::SessionBackend`] over plain
//! HTTP: a long-lived `text/event-stream` GET for events and JSON POSTs for
//! messages, cancellation, and permission decisions.

pub mod client;
pub mod config;
pub mod sse;

pub use client::{HttpBackend, LAST_EVENT_ID};
pub use config::{EndpointTemplates, HttpBackendConfig};
pub use sse::{SseDecoder, SseEvent, sse_record_stream};
