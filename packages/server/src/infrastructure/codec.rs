//! JSON implementation of [`FrameCodec`].

use crate::domain::{DecodeError, Envelope, FrameCodec};

use super::dto::{
    conversion::{envelope_to_value, frame_to_envelope},
    websocket::WireFrame,
};

/// Default upper bound on `body` length in bytes
pub const DEFAULT_MAX_BODY_LEN: usize = 4096;

/// JSON text-frame codec with a body size limit
#[derive(Debug, Clone, Copy)]
pub struct JsonFrameCodec {
    max_body_len: usize,
}

impl JsonFrameCodec {
    pub fn new(max_body_len: usize) -> Self {
        Self { max_body_len }
    }

    pub fn max_body_len(&self) -> usize {
        self.max_body_len
    }
}

impl Default for JsonFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_LEN)
    }
}

impl FrameCodec for JsonFrameCodec {
    fn decode(&self, raw: &str) -> Result<Envelope, DecodeError> {
        let frame: WireFrame =
            serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        frame_to_envelope(frame, self.max_body_len)
    }

    fn encode(&self, envelope: &Envelope) -> String {
        envelope_to_value(envelope).to_string()
    }
}
