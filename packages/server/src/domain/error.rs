//! Domain error types.

use thiserror::Error;

use super::value_object::Identity;

/// Validation failure for an identity or room name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,

    #[error("name is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("name must not contain control characters")]
    ControlCharacter,
}

/// Structural violation found while decoding an inbound frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    InvalidJson(String),

    #[error("malformed frame: missing required field '{0}'")]
    MissingField(&'static str),

    #[error("malformed frame: unknown message type '{0}'")]
    UnknownType(String),

    #[error("malformed frame: body is {len} bytes, limit is {max}")]
    BodyTooLong { len: usize, max: usize },

    #[error("malformed frame: invalid sender: {0}")]
    InvalidSender(NameError),

    #[error("malformed frame: invalid room: {0}")]
    InvalidRoom(NameError),

    #[error("malformed frame: binary frames are not supported")]
    NotText,

    /// Refused by the transport before decoding (e.g. larger than the frame limit).
    /// The stream cannot be resynchronised afterwards.
    #[error("malformed frame: unreadable frame: {0}")]
    Unreadable(String),
}

/// Session registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("name taken")]
    NameTaken(Identity),
}

/// Outbound queue errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The recipient stopped draining its queue; it is moved to Closing.
    #[error("outbound queue of '{0}' is full")]
    CapacityExceeded(Identity),
}
