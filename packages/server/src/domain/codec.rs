//! Frame codec interface.
//!
//! The concrete wire format lives in the infrastructure layer; use cases only
//! see this trait.

use super::{envelope::Envelope, error::DecodeError};

/// Converts between raw text frames and [`Envelope`]s.
pub trait FrameCodec: Send + Sync {
    /// Decode and validate one inbound frame.
    fn decode(&self, raw: &str) -> Result<Envelope, DecodeError>;

    /// Encode an envelope. Never fails for a well-formed envelope.
    fn encode(&self, envelope: &Envelope) -> String;
}
