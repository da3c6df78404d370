//! UseCase: オンライン中の参加者一覧取得

use std::sync::Arc;

use crate::domain::{Participant, RoomDirectory, SessionRegistry};

/// 参加者一覧取得のユースケース
pub struct GetPresenceUseCase {
    registry: Arc<dyn SessionRegistry>,
    rooms: Arc<dyn RoomDirectory>,
}

impl GetPresenceUseCase {
    /// 新しい GetPresenceUseCase を作成
    pub fn new(registry: Arc<dyn SessionRegistry>, rooms: Arc<dyn RoomDirectory>) -> Self {
        Self { registry, rooms }
    }

    /// アクティブな参加者を Identity 順で返す
    pub async fn execute(&self) -> Vec<Participant> {
        let mut sessions = self.registry.active_sessions().await;
        sessions.sort_by(|a, b| a.identity().cmp(b.identity()));

        let mut participants = Vec::with_capacity(sessions.len());
        for session in sessions {
            let rooms = self.rooms.rooms_of(session.identity()).await;
            participants.push(Participant {
                identity: session.identity().clone(),
                connected_at: session.connected_at(),
                rooms,
            });
        }
        participants
    }

    /// アクティブな参加者数
    pub async fn count(&self) -> usize {
        self.registry.active_sessions().await.len()
    }
}
