//! Call client error types.
//!
//! Two error channels block a call: media capture and the signaling session.
//! Call-level failures are not errors here; they close the call.

use thiserror::Error;

/// Local media capture failure.
///
/// Permission denied, missing device and device-in-use all surface as this one
/// type; the message is whatever the capture collaborator reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CaptureError {
    message: String,
}

impl CaptureError {
    /// Create a capture error with the collaborator's message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The collaborator's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Signaling session failure. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// Lost or failed connection to the signaling service.
    #[error("Network error: {0}")]
    Network(String),

    /// The requested identifier is already registered.
    #[error("Identifier already taken: {0}")]
    IdTaken(String),

    /// The signaling service could not be reached or refused the session.
    #[error("Signaling service unavailable: {0}")]
    ServerUnavailable(String),

    /// The dialed peer is not registered with the service.
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    /// The session was already destroyed.
    #[error("Signaling session closed")]
    SessionClosed,

    /// Anything else reported by the service.
    #[error("Signaling error: {0}")]
    Other(String),
}

impl SignalingError {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            SignalingError::Network(_) => "network",
            SignalingError::IdTaken(_) => "id_taken",
            SignalingError::ServerUnavailable(_) => "server_unavailable",
            SignalingError::PeerUnavailable(_) => "peer_unavailable",
            SignalingError::SessionClosed => "session_closed",
            SignalingError::Other(_) => "other",
        }
    }
}

/// Call client error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Local media capture failed.
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Signaling session failed.
    #[error("{0}")]
    Signaling(#[from] SignalingError),

    /// A local stream acquisition is already pending.
    #[error("Local media acquisition already in progress")]
    AcquisitionInFlight,

    /// The call session has ended and no longer accepts commands.
    #[error("Call session has ended")]
    SessionEnded,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallError {
    /// Returns a message safe to show on the error screen.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            CallError::Capture(e) => e.message().to_string(),
            CallError::Signaling(SignalingError::PeerUnavailable(id)) => {
                format!("Could not find a call with code {id}")
            }
            CallError::Signaling(_) => "Could not reach the call service".to_string(),
            CallError::AcquisitionInFlight => {
                "Camera is still starting, please try again".to_string()
            }
            CallError::SessionEnded => "The call has ended".to_string(),
            CallError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}
