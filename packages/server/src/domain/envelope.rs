//! Protocol message unit exchanged over the wire.

use std::fmt;

use super::value_object::{Identity, RoomName, Timestamp};

/// Body of the Presence frame that acknowledges a successful handshake.
pub const WELCOME_BODY: &str = "welcome";

/// Body of the Presence frame broadcast when the server starts draining.
pub const SHUTDOWN_BODY: &str = "server shutting down";

/// Presence body announcing that `identity` came online or joined a room.
pub fn joined_notice(identity: &Identity) -> String {
    format!("{identity} joined")
}

/// Presence body announcing that `identity` went offline or left a room.
pub fn left_notice(identity: &Identity) -> String {
    format!("{identity} left")
}

/// Closed set of message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Join,
    Leave,
    Chat,
    Error,
    Presence,
}

impl EnvelopeKind {
    pub const ALL: [EnvelopeKind; 5] = [
        EnvelopeKind::Join,
        EnvelopeKind::Leave,
        EnvelopeKind::Chat,
        EnvelopeKind::Error,
        EnvelopeKind::Presence,
    ];

    /// Wire name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::Join => "Join",
            EnvelopeKind::Leave => "Leave",
            EnvelopeKind::Chat => "Chat",
            EnvelopeKind::Error => "Error",
            EnvelopeKind::Presence => "Presence",
        }
    }

    /// Parse a wire name. Matching is exact (case-sensitive).
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Kinds only the server may originate
    pub fn is_server_originated(self) -> bool {
        matches!(self, EnvelopeKind::Error | EnvelopeKind::Presence)
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded protocol message.
///
/// `sender` is absent for server-originated Presence/Error envelopes and
/// `room` is absent for global scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    pub sender: Option<Identity>,
    pub room: Option<RoomName>,
    pub body: String,
    pub timestamp: Timestamp,
}

impl Envelope {
    pub fn new(
        kind: EnvelopeKind,
        sender: Option<Identity>,
        room: Option<RoomName>,
        body: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind,
            sender,
            room,
            body: body.into(),
            timestamp,
        }
    }

    pub fn join(sender: Identity, room: Option<RoomName>, timestamp: Timestamp) -> Self {
        Self::new(EnvelopeKind::Join, Some(sender), room, "", timestamp)
    }

    pub fn leave(sender: Identity, room: Option<RoomName>, timestamp: Timestamp) -> Self {
        Self::new(EnvelopeKind::Leave, Some(sender), room, "", timestamp)
    }

    pub fn chat(
        sender: Identity,
        room: Option<RoomName>,
        body: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(EnvelopeKind::Chat, Some(sender), room, body, timestamp)
    }

    pub fn presence(room: Option<RoomName>, body: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(EnvelopeKind::Presence, None, room, body, timestamp)
    }

    pub fn error(body: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(EnvelopeKind::Error, None, None, body, timestamp)
    }

    pub fn is_welcome(&self) -> bool {
        self.kind == EnvelopeKind::Presence && self.room.is_none() && self.body == WELCOME_BODY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_accepts_all_wire_names() {
        // テスト項目: 全ての種別がワイヤ名から復元できる
        for kind in EnvelopeKind::ALL {
            assert_eq!(EnvelopeKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_kind_parse_is_case_sensitive() {
        // テスト項目: 種別名の大文字小文字は区別される
        assert_eq!(EnvelopeKind::parse("chat"), None);
        assert_eq!(EnvelopeKind::parse("Whisper"), None);
    }

    #[test]
    fn test_server_originated_kinds() {
        // テスト項目: Error と Presence のみがサーバー発信種別である
        let server_only: Vec<_> = EnvelopeKind::ALL
            .into_iter()
            .filter(|kind| kind.is_server_originated())
            .collect();
        assert_eq!(server_only, vec![EnvelopeKind::Error, EnvelopeKind::Presence]);
    }

    #[test]
    fn test_presence_has_no_sender() {
        // テスト項目: Presence エンベロープは送信者を持たない
        let envelope = Envelope::presence(None, WELCOME_BODY, Timestamp::new(1));
        assert!(envelope.sender.is_none());
        assert!(envelope.is_welcome());
    }
}
