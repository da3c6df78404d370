//! UseCase: メッセージのルーティング
//!
//! 受信したエンベロープごとに配送先セッションを決定し、必要であれば
//! Room Directory を更新します。配送（キューへの追加）は [`dispatch`] が行い、
//! 受信者の遅さによってブロックすることはありません。
//!
//! ## ポリシー
//!
//! - Chat は送信者自身にはエコーしない（グローバル・ルームとも）
//! - ルームの Join/Leave の Presence は操作した本人にも届く
//! - sender が省略された場合はセッションの Identity を補う

use std::sync::Arc;

use kchat_shared::time::Clock;

use crate::domain::{
    Envelope, EnvelopeKind, FrameCodec, RoomDirectory, RoomName, SessionHandle, SessionRegistry,
    Timestamp,
    envelope::{joined_notice, left_notice},
    session::EnqueueOutcome,
};

use super::error::RouteError;

/// 配送 1 件（宛先セッションと送るエンベロープ）
#[derive(Debug, Clone)]
pub struct Delivery {
    pub target: SessionHandle,
    pub envelope: Envelope,
}

/// ルーティング結果
#[derive(Debug, Default)]
pub struct RouteOutcome {
    pub deliveries: Vec<Delivery>,
    /// 送信元セッションを正常終了させる（グローバル Leave）
    pub end_session: bool,
}

impl RouteOutcome {
    fn deliver(deliveries: Vec<Delivery>) -> Self {
        Self {
            deliveries,
            end_session: false,
        }
    }
}

/// [`dispatch`] の集計
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub queued: usize,
    pub dropped: usize,
    /// キュー満杯で Closing に移されたセッション数
    pub evicted: usize,
}

/// 配送をそれぞれの宛先キューに積む
///
/// キューが満杯の宛先はそのセッションだけが閉じられ、他の配送は続行される。
pub fn dispatch(codec: &dyn FrameCodec, deliveries: Vec<Delivery>) -> DispatchReport {
    let mut report = DispatchReport::default();
    for delivery in deliveries {
        let frame = codec.encode(&delivery.envelope);
        match delivery.target.enqueue(frame) {
            Ok(EnqueueOutcome::Queued) => report.queued += 1,
            Ok(EnqueueOutcome::Dropped) => report.dropped += 1,
            Err(e) => {
                tracing::warn!("Closing non-responsive session: {}", e);
                report.evicted += 1;
            }
        }
    }
    report
}

/// メッセージルーター
pub struct MessageRouter {
    /// Session Registry（オンライン中のセッション）
    registry: Arc<dyn SessionRegistry>,
    /// Room Directory（ルームのメンバー）
    rooms: Arc<dyn RoomDirectory>,
    /// タイムスタンプの刻印に使う時計
    clock: Arc<dyn Clock>,
}

impl MessageRouter {
    /// 新しい MessageRouter を作成
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        rooms: Arc<dyn RoomDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            rooms,
            clock,
        }
    }

    /// サーバー時刻
    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// エンベロープの配送先を決定する
    ///
    /// # Returns
    ///
    /// * `Ok(RouteOutcome)` - 配送リスト（Join/Leave の場合は Room Directory 更新済み）
    /// * `Err(RouteError)` - 送信元にのみ Error として返すべき違反
    pub async fn route(
        &self,
        envelope: Envelope,
        from: &SessionHandle,
    ) -> Result<RouteOutcome, RouteError> {
        if !from.is_active() {
            return Err(RouteError::InactiveSender);
        }
        if envelope.kind.is_server_originated() {
            return Err(RouteError::ServerOnlyType(envelope.kind));
        }
        if let Some(claimed) = &envelope.sender
            && claimed != from.identity()
        {
            return Err(RouteError::SenderMismatch {
                claimed: claimed.clone(),
                actual: from.identity().clone(),
            });
        }

        // サーバーが送信者と時刻を刻印する
        let stamped = Envelope {
            sender: Some(from.identity().clone()),
            timestamp: self.now(),
            ..envelope
        };

        match stamped.kind {
            EnvelopeKind::Chat => self.route_chat(stamped, from).await,
            EnvelopeKind::Join => match stamped.room {
                Some(room) => self.join_room(from, &room).await.map(RouteOutcome::deliver),
                None => Err(RouteError::AlreadyJoined),
            },
            EnvelopeKind::Leave => match stamped.room {
                Some(room) => self.leave_room(from, &room).await.map(RouteOutcome::deliver),
                None => Ok(RouteOutcome {
                    deliveries: Vec::new(),
                    end_session: true,
                }),
            },
            EnvelopeKind::Error | EnvelopeKind::Presence => {
                Err(RouteError::ServerOnlyType(stamped.kind))
            }
        }
    }

    /// ルームに参加し、ルームのメンバー（本人を含む）への Presence を返す
    pub async fn join_room(
        &self,
        session: &SessionHandle,
        room: &RoomName,
    ) -> Result<Vec<Delivery>, RouteError> {
        if !self.rooms.join(room, session.identity()).await {
            return Err(RouteError::AlreadyMember(room.clone()));
        }
        tracing::info!("'{}' joined room '{}'", session.identity(), room);
        Ok(self
            .room_presence(room, &joined_notice(session.identity()))
            .await)
    }

    /// ルームから退出し、残りのメンバーと本人への Presence を返す
    pub async fn leave_room(
        &self,
        session: &SessionHandle,
        room: &RoomName,
    ) -> Result<Vec<Delivery>, RouteError> {
        if !self.rooms.leave(room, session.identity()).await {
            return Err(RouteError::NotAMember(room.clone()));
        }
        tracing::info!("'{}' left room '{}'", session.identity(), room);
        let notice = left_notice(session.identity());
        let mut deliveries = self.room_presence(room, &notice).await;
        deliveries.push(Delivery {
            target: session.clone(),
            envelope: Envelope::presence(Some(room.clone()), notice, self.now()),
        });
        Ok(deliveries)
    }

    /// ルームのアクティブなメンバー全員への Presence
    pub async fn room_presence(&self, room: &RoomName, body: &str) -> Vec<Delivery> {
        let members = self.rooms.members_of(room).await;
        let envelope = Envelope::presence(Some(room.clone()), body, self.now());
        self.registry
            .active_sessions()
            .await
            .into_iter()
            .filter(|session| members.contains(session.identity()))
            .map(|target| Delivery {
                target,
                envelope: envelope.clone(),
            })
            .collect()
    }

    /// アクティブな全セッションへの Presence（`exclude` を除く）
    pub async fn global_presence(
        &self,
        body: &str,
        exclude: Option<&SessionHandle>,
    ) -> Vec<Delivery> {
        let envelope = Envelope::presence(None, body, self.now());
        self.registry
            .active_sessions()
            .await
            .into_iter()
            .filter(|session| exclude.is_none_or(|excluded| !excluded.same_session(session)))
            .map(|target| Delivery {
                target,
                envelope: envelope.clone(),
            })
            .collect()
    }

    async fn route_chat(
        &self,
        envelope: Envelope,
        from: &SessionHandle,
    ) -> Result<RouteOutcome, RouteError> {
        let targets: Vec<SessionHandle> = match &envelope.room {
            None => self
                .registry
                .active_sessions()
                .await
                .into_iter()
                .filter(|session| !session.same_session(from))
                .collect(),
            Some(room) => {
                if !self.rooms.is_member(room, from.identity()).await {
                    return Err(RouteError::NotAMember(room.clone()));
                }
                let members = self.rooms.members_of(room).await;
                self.registry
                    .active_sessions()
                    .await
                    .into_iter()
                    .filter(|session| {
                        members.contains(session.identity()) && !session.same_session(from)
                    })
                    .collect()
            }
        };

        Ok(RouteOutcome::deliver(
            targets
                .into_iter()
                .map(|target| Delivery {
                    target,
                    envelope: envelope.clone(),
                })
                .collect(),
        ))
    }
}
