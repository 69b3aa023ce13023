//! Core error types and traits for Tether

use thiserror::Error;

/// Result type alias for Tether operations
pub type TetherResult<T> = Result<T, TetherError>;

/// Unified error trait implemented by every Tether error.
///
/// - error_code(): Unique code for programmatic error identification
/// - message(): Human-readable error message
/// - context(): Optional additional context
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Get optional context about the error
    fn context(&self) -> Option<&str> {
        None
    }

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Main error type for the session coordinator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TetherError {
    /// The event stream could not be opened or failed while being consumed
    #[error("Connection fault: {message}")]
    ConnectionFault {
        message: String,
        context: Option<String>,
    },

    /// The operation is not valid in the current connection state
    #[error("Not connected: {message}")]
    NotConnected { message: String },

    /// No pending permission request with this id
    #[error("Permission request not found: {id}")]
    PermissionNotFound { id: String },

    /// No tool call with this id
    #[error("Tool call not found: {id}")]
    ToolNotFound { id: String },

    /// A collaborator call (send, cancel, grant, deny) failed
    #[error("{operation} failed: {message}")]
    Collaborator {
        operation: String,
        message: String,
        status_code: Option<u16>,
    },

    /// A stream record carried a payload that could not be decoded
    #[error("Decode error for '{event_type}' event: {message}")]
    Decode { event_type: String, message: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// The operation was cancelled before it completed
    #[error("Operation was cancelled")]
    Cancelled,
}
