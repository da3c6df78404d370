//! WebSocket frame DTO.
//!
//! ```text
//! {"type": "Join"|"Leave"|"Chat"|"Error"|"Presence",
//!  "sender": string?, "room": string?, "body": string, "ts": integer}
//! ```

use serde::Deserialize;

/// Inbound JSON frame before validation.
///
/// Every field is optional here so that a missing field is reported by name
/// instead of as a generic serde error. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct WireFrame {
    pub r#type: Option<String>,
    pub sender: Option<String>,
    pub room: Option<String>,
    pub body: Option<String>,
    pub ts: Option<i64>,
}
