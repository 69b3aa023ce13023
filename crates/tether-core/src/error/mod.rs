//! Error types for Tether
//!
//! Every error implements [`UnifiedError`], which provides:
//! - error_code: A unique identifier for programmatic error handling
//! - message: Human-readable error message
//! - context: Optional additional context about where/why the error occurred

mod constructors;
mod conversions;
mod types;
mod unified_error;

pub use types::{TetherError, TetherResult, UnifiedError};
