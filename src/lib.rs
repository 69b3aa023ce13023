//! Tether
//!
//! Client-side coordinator for agent services that accept a message over a
//! request/response channel and report progress over a separate event
//! stream.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether::{HttpBackend, HttpBackendConfig, StreamingCoordinator};
//!
//! # async fn run() -> tether::TetherResult<()> {
//! let backend = Arc::new(HttpBackend::new(HttpBackendConfig::new("http://127.0.0.1:8080"))?);
//! let coordinator = StreamingCoordinator::new("session-1", backend);
//! coordinator.on_content_delta(|delta| print!("{}", delta));
//! coordinator.start()?;
//! # Ok(())
//! # }
//! ```

pub use tether_core::*;
pub use tether_http::{HttpBackend, HttpBackendConfig};

/// The HTTP/SSE transport
pub mod http {
    pub use tether_http::*;
}
