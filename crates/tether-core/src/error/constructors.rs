//! Constructor methods for TetherError

use super::types::TetherError;

impl TetherError {
    /// Create a new connection fault
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFault {
            message: message.into(),
            context: None,
        }
    }

    /// Create a connection fault with context
    pub fn connection_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::ConnectionFault {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a not-connected error
    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            message: message.into(),
        }
    }

    /// Create a permission-not-found error
    pub fn permission_not_found(id: impl Into<String>) -> Self {
        Self::PermissionNotFound { id: id.into() }
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(id: impl Into<String>) -> Self {
        Self::ToolNotFound { id: id.into() }
    }

    /// Create a collaborator failure for the named operation
    pub fn collaborator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a collaborator failure carrying an HTTP status
    pub fn collaborator_with_status(
        operation: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a decode error for an event type
    pub fn decode(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            event_type: event_type.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }
}
