//! Conversion logic between the wire DTO and domain envelopes.

use serde_json::{Map, Value};

use crate::domain::{DecodeError, Envelope, EnvelopeKind, Identity, RoomName, Timestamp};

use super::websocket::WireFrame;

// ========================================
// DTO → Domain Envelope
// ========================================

/// Validate a parsed frame and turn it into an [`Envelope`].
///
/// A frame without `ts` gets timestamp 0; the server re-stamps routed
/// envelopes anyway.
pub fn frame_to_envelope(frame: WireFrame, max_body_len: usize) -> Result<Envelope, DecodeError> {
    let kind_name = frame.r#type.ok_or(DecodeError::MissingField("type"))?;
    let kind = EnvelopeKind::parse(&kind_name).ok_or(DecodeError::UnknownType(kind_name))?;
    let body = frame.body.ok_or(DecodeError::MissingField("body"))?;
    if body.len() > max_body_len {
        return Err(DecodeError::BodyTooLong {
            len: body.len(),
            max: max_body_len,
        });
    }
    let sender = frame
        .sender
        .map(Identity::new)
        .transpose()
        .map_err(DecodeError::InvalidSender)?;
    let room = frame
        .room
        .map(RoomName::new)
        .transpose()
        .map_err(DecodeError::InvalidRoom)?;

    Ok(Envelope {
        kind,
        sender,
        room,
        body,
        timestamp: Timestamp::new(frame.ts.unwrap_or_default()),
    })
}

// ========================================
// Domain Envelope → JSON
// ========================================

/// Build the JSON object for an envelope. Absent `sender`/`room` are omitted.
pub fn envelope_to_value(envelope: &Envelope) -> Value {
    let mut object = Map::new();
    object.insert(
        "type".to_string(),
        Value::String(envelope.kind.as_str().to_string()),
    );
    if let Some(sender) = &envelope.sender {
        object.insert("sender".to_string(), Value::String(sender.to_string()));
    }
    if let Some(room) = &envelope.room {
        object.insert("room".to_string(), Value::String(room.to_string()));
    }
    object.insert("body".to_string(), Value::String(envelope.body.clone()));
    object.insert("ts".to_string(), Value::from(envelope.timestamp.value()));
    Value::Object(object)
}
