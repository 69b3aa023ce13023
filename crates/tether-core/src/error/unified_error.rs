//! UnifiedError trait implementation for TetherError

use super::types::{TetherError, UnifiedError};

impl UnifiedError for TetherError {
    fn error_code(&self) -> &str {
        match self {
            Self::ConnectionFault { .. } => "TETHER_CONNECTION",
            Self::NotConnected { .. } => "TETHER_NOT_CONNECTED",
            Self::PermissionNotFound { .. } => "TETHER_PERMISSION_NOT_FOUND",
            Self::ToolNotFound { .. } => "TETHER_TOOL_NOT_FOUND",
            Self::Collaborator { .. } => "TETHER_COLLABORATOR",
            Self::Decode { .. } => "TETHER_DECODE",
            Self::Config { .. } => "TETHER_CONFIG",
            Self::Cancelled => "TETHER_CANCELLED",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::ConnectionFault { message, .. } => message,
            Self::NotConnected { message } => message,
            Self::PermissionNotFound { id } => id,
            Self::ToolNotFound { id } => id,
            Self::Collaborator { message, .. } => message,
            Self::Decode { message, .. } => message,
            Self::Config { message, .. } => message,
            Self::Cancelled => "Operation was cancelled",
        }
    }

    fn context(&self) -> Option<&str> {
        match self {
            Self::ConnectionFault { context, .. } => context.as_deref(),
            Self::Config { context, .. } => context.as_deref(),
            Self::Collaborator { operation, .. } => Some(operation),
            Self::Decode { event_type, .. } => Some(event_type),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFault { .. } => true,
            Self::Collaborator { status_code, .. } => {
                matches!(status_code, Some(429) | Some(502) | Some(503) | Some(504))
            }
            _ => false,
        }
    }
}
