//! Error types for the session client.

use agentwire_core::ConfigError;

/// Errors from connecting to or talking with the backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The websocket handshake failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The socket failed after it was open.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A command was sent with no open socket.
    #[error("Not connected")]
    NotConnected,

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An outbound command could not be encoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The session's background tasks have shut down.
    #[error("Session channel closed")]
    ChannelClosed,
}

impl ClientError {
    /// Transport failures on an established connection are worth reconnecting for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Handshake(_))
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Transport("reset".into()).is_retryable());
        assert!(!ClientError::Handshake("refused".into()).is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::Config(ConfigError::EmptySessionId).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClientError::Handshake("refused".into()).to_string(),
            "Handshake failed: refused"
        );
        assert_eq!(ClientError::NotConnected.to_string(), "Not connected");
        assert!(ClientError::Handshake("x".into()).is_handshake());
    }
}
