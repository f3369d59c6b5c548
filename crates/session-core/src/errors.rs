//! Error types for confab-session-core
//!
//! Errors fall into the categories a meeting client has to react to
//! differently: negotiation failures and resource exhaustion are handled
//! locally, transport and configuration failures are surfaced to the caller.

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Broad classification of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Negotiation,
    ResourceExhausted,
    Device,
    Transport,
    Configuration,
    State,
    Internal,
}

/// Errors that can occur while running a meeting session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed or missing offer/answer, or a failed vendor negotiation call
    #[error("Negotiation with {attendee_id} failed: {reason}")]
    Negotiation { attendee_id: String, reason: String },

    /// A bounded resource (e.g. video tile slots) has no free capacity
    #[error("No free {resource} slot (limit {limit})")]
    ResourceExhausted { resource: &'static str, limit: usize },

    /// Camera or microphone unavailable
    #[error("Media device error: {message}")]
    Device { message: String },

    /// Signaling channel closed or errored
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Attendee is not known to the session
    #[error("Attendee not found: {attendee_id}")]
    AttendeeNotFound { attendee_id: String },

    /// Operation not valid in the current state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// The session has been stopped
    #[error("Session is closed")]
    SessionClosed,

    /// Descriptor (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SessionError {
    /// Create a negotiation error for the given attendee
    pub fn negotiation(attendee_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Negotiation {
            attendee_id: attendee_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a resource exhaustion error
    pub fn resource_exhausted(resource: &'static str, limit: usize) -> Self {
        Self::ResourceExhausted { resource, limit }
    }

    /// Create a media device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an attendee not found error
    pub fn attendee_not_found(attendee_id: impl Into<String>) -> Self {
        Self::AttendeeNotFound {
            attendee_id: attendee_id.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Negotiation { .. } => ErrorCategory::Negotiation,
            Self::ResourceExhausted { .. } => ErrorCategory::ResourceExhausted,
            Self::Device { .. } => ErrorCategory::Device,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Configuration { .. } | Self::Serialization(_) => ErrorCategory::Configuration,
            Self::AttendeeNotFound { .. } | Self::InvalidState { .. } | Self::SessionClosed => {
                ErrorCategory::State
            }
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Whether the session recovers locally from this error.
    ///
    /// Transport and configuration errors are reported to the caller and
    /// never retried here.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Negotiation | ErrorCategory::ResourceExhausted | ErrorCategory::Device
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(SessionError::negotiation("A", "bad offer").is_recoverable());
        assert!(SessionError::resource_exhausted("video tile", 16).is_recoverable());
        assert!(SessionError::device("no camera").is_recoverable());
        assert!(!SessionError::transport("closed").is_recoverable());
        assert!(!SessionError::config("empty channel ARN").is_recoverable());
        assert!(!SessionError::SessionClosed.is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = SessionError::resource_exhausted("video tile", 16);
        assert_eq!(err.to_string(), "No free video tile slot (limit 16)");

        let err = SessionError::negotiation("attendee-1", "offer has no SDP body");
        assert_eq!(
            err.to_string(),
            "Negotiation with attendee-1 failed: offer has no SDP body"
        );
    }
}
