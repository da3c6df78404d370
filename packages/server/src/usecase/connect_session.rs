//! UseCase: セッション接続（ハンドシェイク）処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectSessionUseCase::execute() メソッド
//! - 最初のフレームの検証、Registry への登録、welcome と参加通知
//!
//! ### なぜこのテストが必要か
//! - 同名の接続を防ぐ（Identity の一意性）
//! - welcome が必ずキューの先頭に来ることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規セッションの登録（ルーム指定あり／なし）
//! - 異常系：Join 以外のフレーム、sender なし、重複した名前

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{
    Envelope, EnvelopeKind, FrameCodec, SessionHandle, SessionRegistry,
    envelope::{WELCOME_BODY, joined_notice},
};

use super::{
    error::ConnectError,
    router::{MessageRouter, dispatch},
};

/// セッション接続のユースケース
pub struct ConnectSessionUseCase {
    /// Session Registry（オンライン中のセッション）
    registry: Arc<dyn SessionRegistry>,
    /// ルーター（Presence の配送先計算）
    router: Arc<MessageRouter>,
    /// フレームコーデック
    codec: Arc<dyn FrameCodec>,
    /// セッションごとの送信キュー容量
    queue_capacity: usize,
}

impl ConnectSessionUseCase {
    /// 新しい ConnectSessionUseCase を作成
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        router: Arc<MessageRouter>,
        codec: Arc<dyn FrameCodec>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            registry,
            router,
            codec,
            queue_capacity,
        }
    }

    /// ハンドシェイクを実行
    ///
    /// # Arguments
    ///
    /// * `raw` - クライアントから受信した最初のテキストフレーム
    ///
    /// # Returns
    ///
    /// * `Ok((SessionHandle, Receiver))` - Active になったセッションと送信キューの受信側
    /// * `Err(ConnectError)` - 接続拒否（呼び出し側が Error を返して切断する）
    pub async fn execute(
        &self,
        raw: &str,
    ) -> Result<(SessionHandle, mpsc::Receiver<String>), ConnectError> {
        // 1. 最初のフレームは sender 付きの Join でなければならない
        let envelope = self.codec.decode(raw)?;
        if envelope.kind != EnvelopeKind::Join {
            return Err(ConnectError::NotAJoin(envelope.kind));
        }
        let identity = envelope.sender.ok_or(ConnectError::MissingSender)?;

        // 2. セッションを作成し、welcome をキューの先頭に積む
        let now = self.router.now();
        let (session, rx) = SessionHandle::new(identity.clone(), self.queue_capacity, now);
        let welcome = Envelope::presence(None, WELCOME_BODY, now);
        if let Err(e) = session.enqueue(self.codec.encode(&welcome)) {
            tracing::warn!("Could not queue welcome: {}", e);
        }

        // 3. Registry に登録（同名の場合は NameTaken）
        self.registry.register(session.clone()).await?;
        tracing::info!("'{}' joined the chat (session {})", identity, session.id());

        // 4. 参加通知（グローバル + 指定ルーム）
        let mut deliveries = self
            .router
            .global_presence(&joined_notice(&identity), Some(&session))
            .await;
        if let Some(room) = envelope.room {
            match self.router.join_room(&session, &room).await {
                Ok(room_deliveries) => deliveries.extend(room_deliveries),
                Err(e) => tracing::warn!("Handshake room join failed: {}", e),
            }
        }
        dispatch(self.codec.as_ref(), deliveries);

        Ok((session, rx))
    }

    /// 接続拒否時にクライアントへ返す Error フレーム
    pub fn rejection_frame(&self, error: &ConnectError) -> String {
        self.codec
            .encode(&Envelope::error(error.to_string(), self.router.now()))
    }
}
