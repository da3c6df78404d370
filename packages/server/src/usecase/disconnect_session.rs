//! UseCase: セッション切断処理
//!
//! 切断理由（正常終了・エラー・タイムアウト・シャットダウン）に関わらず、
//! セッションごとに 1 度だけ呼ばれます。
//!
//! 順序:
//! 1. 全ルームから退出（Room Directory）
//! 2. Registry から削除（同じセッションのときのみ）
//! 3. 各ルームと全体に "{identity} left" を通知

use std::sync::Arc;

use crate::domain::{
    FrameCodec, RoomDirectory, RoomName, SessionHandle, SessionRegistry, envelope::left_notice,
};

use super::router::{MessageRouter, dispatch};

/// セッション切断のユースケース
pub struct DisconnectSessionUseCase {
    registry: Arc<dyn SessionRegistry>,
    rooms: Arc<dyn RoomDirectory>,
    router: Arc<MessageRouter>,
    codec: Arc<dyn FrameCodec>,
}

impl DisconnectSessionUseCase {
    /// 新しい DisconnectSessionUseCase を作成
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        rooms: Arc<dyn RoomDirectory>,
        router: Arc<MessageRouter>,
        codec: Arc<dyn FrameCodec>,
    ) -> Self {
        Self {
            registry,
            rooms,
            router,
            codec,
        }
    }

    /// 切断処理を実行
    ///
    /// # Returns
    ///
    /// * `Some(rooms)` - 登録を解除した。退出したルームの一覧
    /// * `None` - このセッションは登録されていなかった（既に別のセッションに置き換わっている等）
    pub async fn execute(&self, session: &SessionHandle) -> Option<Vec<RoomName>> {
        let identity = session.identity();

        // 同名の新しいセッションのメンバーシップを消さないよう、同一セッションか確認する
        let registered = self
            .registry
            .lookup(identity)
            .await
            .is_some_and(|current| current.same_session(session));
        if !registered {
            tracing::debug!("Session {} for '{}' was not registered", session.id(), identity);
            return None;
        }

        // 1. ルームから退出
        let left_rooms = self.rooms.leave_all(identity).await;

        // 2. Registry から削除
        if !self.registry.unregister(session).await {
            return None;
        }
        tracing::info!(
            "'{}' disconnected (session {}, {} room(s))",
            identity,
            session.id(),
            left_rooms.len()
        );

        // 3. 退出の通知
        let notice = left_notice(identity);
        let mut deliveries = Vec::new();
        for room in &left_rooms {
            deliveries.extend(self.router.room_presence(room, &notice).await);
        }
        deliveries.extend(self.router.global_presence(&notice, Some(session)).await);
        dispatch(self.codec.as_ref(), deliveries);

        Some(left_rooms)
    }
}
