//! Error types for the call engine
//!
//! Every gateway operation returns either a value or exactly one [`CallError`].
//! The taxonomy mirrors what callers of the telephony API can act on:
//!
//! - `InvalidArgument` - bad call id, slot id or malformed option
//! - `InvalidState` - the operation is not legal in the current call state
//! - `PermissionDenied` - the caller lacks the required capability
//! - `ServiceUnavailable` - the radio/call service cannot be reached
//! - `Internal` - unexpected engine fault
//! - `Unsupported` - capability not available on this device or call type
//!
//! `NotFound` is raised by the call store. The gateway reports it to API
//! callers as `InvalidArgument` (see [`CallError::into_api_error`]).

use thiserror::Error;

use crate::types::CallId;

/// Result type for call engine operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors that can occur in the call engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Bad call id, slot id or parameter
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Operation not legal in the current call state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Caller lacks the capability required by the operation
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The radio or call service could not be reached
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Unexpected engine fault
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Capability not available on this device or for this call
    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    /// Configuration rejected by validation
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Record is not (or no longer) in the call store
    #[error("Call {0} not found")]
    NotFound(CallId),
}

impl CallError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Map store-level errors onto the error kinds API callers see.
    pub fn into_api_error(self) -> Self {
        match self {
            Self::NotFound(call_id) => Self::invalid_argument(format!("unknown call id {}", call_id)),
            other => other,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::InvalidState { .. } => "invalid_state",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
            Self::Unsupported { .. } => "unsupported",
            Self::Configuration { .. } => "configuration",
            Self::NotFound(_) => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_invalid_argument() {
        let err = CallError::NotFound(CallId(7)).into_api_error();
        assert!(err.is_invalid_argument());
        assert_eq!(err.to_string(), "Invalid argument: unknown call id 7");
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = CallError::invalid_state("hold on disconnected call").into_api_error();
        assert!(err.is_invalid_state());
        assert_eq!(err.category(), "invalid_state");
    }
}
