//! Error types for agentwire-core
//!
//! Event handling itself never fails from the caller's point of view: the
//! reducer logs and drops anything it cannot use. These types describe *why*
//! something was dropped, and cover the few fallible setup operations
//! (configuration, URL building).

use thiserror::Error;

/// Why an inbound frame could not be turned into a [`crate::StreamEvent`]
#[derive(Debug, Error)]
pub enum EventError {
    /// Frame was not a valid JSON envelope
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope `type` is not one this client understands
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// A field the event type requires was absent or had the wrong shape
    #[error("{event_type} event is missing required field `{field}`")]
    MissingField {
        /// Envelope `type` of the offending event
        event_type: String,
        /// Name of the missing field
        field: &'static str,
    },
}

impl EventError {
    pub(crate) fn missing(event_type: &str, field: &'static str) -> Self {
        Self::MissingField {
            event_type: event_type.to_string(),
            field,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base URL could not be parsed
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl {
        /// The URL as given
        url: String,
        /// Parser message
        reason: String,
    },

    /// URL scheme is not a websocket scheme
    #[error("unsupported url scheme `{0}` (expected ws or wss)")]
    UnsupportedScheme(String),

    /// Session id was empty
    #[error("session id must not be empty")]
    EmptySessionId,
}
