//! Client configuration.
//!
//! Reconnection uses linear backoff: attempt `n` waits `base_delay_ms * n`.
//! Once `max_attempts` reconnects have failed the client gives up and stays
//! disconnected until it is explicitly asked to connect again.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default base reconnect delay.
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Default capacity of the action queue feeding the reducer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Reconnection policy after an unexpected close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (default: 5)
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number (default: 1000ms)
    pub base_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
        }
    }
}

impl ReconnectConfig {
    /// Policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before the given (1-based) attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// True if the given (1-based) attempt is within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }
}

/// Configuration for a streaming session.
///
/// # Example
/// ```
/// use agentwire_core::{ClientConfig, ReconnectConfig};
///
/// let config = ClientConfig::new("ws://localhost:8000/ws")
///     .with_reconnect(ReconnectConfig { max_attempts: 3, base_delay_ms: 250 })
///     .with_channel_capacity(64);
///
/// let url = config.session_url("abc").unwrap();
/// assert_eq!(url.as_str(), "ws://localhost:8000/ws/abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base websocket URL; the session id is appended as the last path segment.
    pub url: String,
    pub reconnect: ReconnectConfig,
    /// Capacity of the action queue feeding the reducer.
    pub channel_capacity: usize,
}

impl ClientConfig {
    /// Configuration with default reconnect policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Override the reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Override the action queue capacity (minimum 1).
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Full websocket URL for a session.
    pub fn session_url(&self, session_id: &str) -> Result<Url, ConfigError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(ConfigError::EmptySessionId);
        }

        let base = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match base.scheme() {
            "ws" | "wss" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }

        let mut url = base;
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: "url cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_config_default() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 1_000);
    }

    #[test]
    fn test_delay_is_linear() {
        let config = ReconnectConfig {
            max_attempts: 5,
            base_delay_ms: 200,
        };
        let cases = [(1, 200), (2, 400), (3, 600), (5, 1_000)];
        for (attempt, expected) in cases {
            assert_eq!(
                config.delay_for(attempt),
                Duration::from_millis(expected),
                "Failed for attempt={}",
                attempt
            );
        }
    }

    #[test]
    fn test_allows_respects_budget() {
        let config = ReconnectConfig {
            max_attempts: 5,
            base_delay_ms: 1,
        };
        assert!(!config.allows(0));
        assert!(config.allows(1));
        assert!(config.allows(5));
        assert!(!config.allows(6));

        assert!(!ReconnectConfig::disabled().allows(1));
    }

    #[test]
    fn test_session_url() {
        let cases = [
            ("ws://localhost:8000/ws", "ws://localhost:8000/ws/s1"),
            ("ws://localhost:8000/ws/", "ws://localhost:8000/ws/s1"),
            ("wss://example.com", "wss://example.com/s1"),
        ];
        for (base, expected) in cases {
            let url = ClientConfig::new(base).session_url("s1").unwrap();
            assert_eq!(url.as_str(), expected, "Failed for base={}", base);
        }
    }

    #[test]
    fn test_session_url_errors() {
        assert!(matches!(
            ClientConfig::new("ws://localhost").session_url("  "),
            Err(ConfigError::EmptySessionId)
        ));
        assert!(matches!(
            ClientConfig::new("http://localhost").session_url("s1"),
            Err(ConfigError::UnsupportedScheme(s)) if s == "http"
        ));
        assert!(matches!(
            ClientConfig::new("not a url").session_url("s1"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_channel_capacity_minimum() {
        assert_eq!(
            ClientConfig::new("ws://x").with_channel_capacity(0).channel_capacity,
            1
        );
    }
}
