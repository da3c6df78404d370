//! Server configuration.

use std::time::Duration;

use thiserror::Error;

use crate::{domain::RoomRetention, infrastructure::codec::DEFAULT_MAX_BODY_LEN};

/// Invalid configuration values, reported at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid host '{0}'")]
    InvalidHost(String),
}

/// Runtime options of the chat server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port (0 = ephemeral)
    pub port: u16,
    /// Max `body` bytes per frame
    pub max_body_len: usize,
    /// Outbound frames buffered per session
    pub queue_capacity: usize,
    /// Upper bound on the shutdown drain
    pub drain_timeout: Duration,
    /// Time allowed for the first `Join`
    pub handshake_timeout: Duration,
    /// Consecutive malformed frames before the session is closed
    pub max_malformed: u32,
    pub room_retention: RoomRetention,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_len: DEFAULT_MAX_BODY_LEN,
            queue_capacity: 256,
            drain_timeout: Duration::from_millis(2000),
            handshake_timeout: Duration::from_millis(10_000),
            max_malformed: 3,
            room_retention: RoomRetention::DestroyEmpty,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }
        if self.max_body_len == 0 {
            return Err(ConfigError::Zero("max-body-len"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue-capacity"));
        }
        if self.max_malformed == 0 {
            return Err(ConfigError::Zero("max-malformed"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Zero("handshake-timeout-ms"));
        }
        Ok(())
    }

    /// `host:port` as passed to the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Largest WebSocket message accepted by the transport.
    ///
    /// JSON escaping can expand a body up to six times (`\uXXXX`), plus room
    /// for the other fields. Frames within this bound whose body is still too
    /// long are answered by the codec with an `Error` instead.
    pub fn max_frame_len(&self) -> usize {
        self.max_body_len.saturating_mul(6).saturating_add(2048)
    }
}
