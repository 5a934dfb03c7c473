//! Error types for the voice session.

use thiserror::Error;

use crate::transport::ConnectionState;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures acquiring the local microphone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Everything that can end or interrupt a session attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Missing or invalid process configuration, such as the credential.
    #[error("{0}")]
    Configuration(String),

    #[error("Microphone error: {0}")]
    Microphone(#[from] MediaError),

    #[error("Failed to create session offer: {0}")]
    OfferCreation(String),

    /// The negotiation endpoint answered with a non-success status.
    #[error("API error: {status} {reason}")]
    Negotiation { status: u16, reason: String },

    /// The negotiation request never got an answer.
    #[error("API error: {0}")]
    Request(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer connection dropped after it had been established.
    #[error("Connection {0}")]
    TransportFailure(ConnectionState),

    /// The remote service reported an error on the side-channel.
    #[error("{0}")]
    Protocol(String),

    /// The attempt was cancelled by a disconnect before it completed.
    #[error("Connection attempt was cancelled")]
    Superseded,
}

impl SessionError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn negotiation<S: Into<String>>(status: u16, reason: S) -> Self {
        Self::Negotiation {
            status,
            reason: reason.into(),
        }
    }

    /// Title of the user-facing notice raised for this error.
    pub fn title(&self) -> &'static str {
        match self {
            SessionError::Configuration(_) => "Configuration Error",
            SessionError::Protocol(_) => "Error",
            _ => "Connection Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_detail() {
        let e = SessionError::negotiation(500, "Internal Server Error");
        assert_eq!(e.to_string(), "API error: 500 Internal Server Error");

        let e = SessionError::from(MediaError::PermissionDenied("user dismissed prompt".to_string()));
        assert_eq!(e.to_string(), "Microphone error: permission denied: user dismissed prompt");
        assert_eq!(e.title(), "Connection Error");

        let e = SessionError::TransportFailure(ConnectionState::Failed);
        assert_eq!(e.to_string(), "Connection failed");
        assert_eq!(e.title(), "Connection Error");
    }
}
