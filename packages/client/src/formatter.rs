//! Message formatting utilities for client display.

use kchat_server::domain::{Envelope, EnvelopeKind};
use kchat_shared::time::timestamp_to_rfc3339;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format any envelope received from the server
    pub fn format_envelope(envelope: &Envelope, current_identity: &str) -> String {
        let room = envelope.room.as_ref().map(|room| room.as_str());
        match envelope.kind {
            EnvelopeKind::Chat => Self::format_chat_message(
                envelope
                    .sender
                    .as_ref()
                    .map_or("?", |sender| sender.as_str()),
                room,
                &envelope.body,
                envelope.timestamp.value(),
            ),
            EnvelopeKind::Presence if envelope.is_welcome() => {
                Self::format_welcome(current_identity)
            }
            EnvelopeKind::Presence => {
                Self::format_presence(room, &envelope.body, envelope.timestamp.value())
            }
            EnvelopeKind::Error => Self::format_error(&envelope.body),
            // サーバーからは届かない種別
            EnvelopeKind::Join | EnvelopeKind::Leave => Self::format_raw_message(&envelope.body),
        }
    }

    /// Format the banner shown after a successful handshake
    pub fn format_welcome(identity: &str) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str(&format!("Welcome, {}! Type /help for commands.\n", identity));
        output.push_str("============================================================\n");
        output
    }

    /// Format a presence notification
    ///
    /// # Arguments
    ///
    /// * `room` - Room the notice is scoped to (`None` = global)
    /// * `body` - e.g. "bob joined"
    /// * `at` - Unix timestamp (milliseconds)
    pub fn format_presence(room: Option<&str>, body: &str, at: i64) -> String {
        let timestamp_str = timestamp_to_rfc3339(at);
        match room {
            Some(room) => format!("\n* [#{}] {} at {}\n", room, body, timestamp_str),
            None => format!("\n* {} at {}\n", body, timestamp_str),
        }
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `from` - The identity of the sender
    /// * `room` - Room the message was sent to (`None` = global)
    /// * `content` - The message content
    /// * `sent_at` - Unix timestamp when the message was routed (milliseconds)
    pub fn format_chat_message(
        from: &str,
        room: Option<&str>,
        content: &str,
        sent_at: i64,
    ) -> String {
        let timestamp_str = timestamp_to_rfc3339(sent_at);
        let scope = room.map(|room| format!(" [#{}]", room)).unwrap_or_default();
        format!(
            "\n\n------------------------------------------------------------\n\
             @{}{}: {}\n\
             sent at {}\n\
             ------------------------------------------------------------\n",
            from, scope, content, timestamp_str
        )
    }

    /// Format an error reported by the server
    pub fn format_error(body: &str) -> String {
        format!("\n! {}\n", body)
    }

    /// Format a confirmation message after sending
    pub fn format_sent_confirmation(sent_at: i64) -> String {
        let timestamp_str = timestamp_to_rfc3339(sent_at);
        format!("sent at {}\n", timestamp_str)
    }

    /// Format a binary message notification
    pub fn format_binary_message(byte_count: usize) -> String {
        format!("\n← Received {} bytes of binary data\n", byte_count)
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }
}
