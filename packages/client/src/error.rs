//! Error types for the chat client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The requested name is held by another session
    #[error("Name '{0}' is already taken")]
    NameTaken(String),

    /// The server refused the handshake for another reason
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
}
