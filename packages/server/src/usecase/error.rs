//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{DecodeError, EnvelopeKind, Identity, NameError, RegistryError, RoomName};

/// ハンドシェイク（接続）時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// 最初のフレームが不正
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// 最初のフレームが Join ではない
    #[error("protocol violation: first frame must be Join, got {0}")]
    NotAJoin(EnvelopeKind),

    /// Join に sender が無い
    #[error("protocol violation: Join must carry a sender")]
    MissingSender,

    /// 制限時間内に Join が届かなかった
    #[error("protocol violation: no Join received within {0} ms")]
    HandshakeTimeout(u128),

    /// 同名のセッションが既に存在する
    #[error("name taken")]
    NameTaken(Identity),
}

impl From<RegistryError> for ConnectError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NameTaken(identity) => ConnectError::NameTaken(identity),
        }
    }
}

/// ルーティング時のエラー
///
/// 送信元セッションにのみ Error エンベロープとして返される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("session is not active")]
    InactiveSender,

    #[error("protocol violation: sender '{claimed}' does not match session identity '{actual}'")]
    SenderMismatch { claimed: Identity, actual: Identity },

    #[error("not a member of room '{0}'")]
    NotAMember(RoomName),

    #[error("already a member of room '{0}'")]
    AlreadyMember(RoomName),

    #[error("already joined")]
    AlreadyJoined,

    #[error("{0} messages are server-originated")]
    ServerOnlyType(EnvelopeKind),
}

impl RouteError {
    /// セッションを閉じるべき違反かどうか
    pub fn is_fatal(&self) -> bool {
        matches!(self, RouteError::SenderMismatch { .. })
    }
}

/// ルーム詳細取得時のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomError {
    #[error("invalid room name: {0}")]
    InvalidName(NameError),

    #[error("room '{0}' not found")]
    NotFound(String),
}
