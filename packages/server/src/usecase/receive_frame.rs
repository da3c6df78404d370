//! UseCase: 受信フレームの処理
//!
//! 1 フレームずつ到着順にデコード → ルーティング → 配送を行います。
//! 同一セッションのフレームは逐次処理されるため、送信者ごとの順序が保たれます。
//!
//! ## 不正フレームの扱い
//!
//! - 不正フレーム 1 件: Error を返信して接続は維持
//! - 連続して上限件数（既定 3）に達した場合: Error を返信して接続を閉じる
//! - 正常なフレームを受信すると連続回数はリセットされる
//! - 上限サイズを超えるなど読めなかったフレーム: Error を返信して即座に閉じる

use std::sync::Arc;

use crate::domain::{DecodeError, Envelope, FrameCodec, MalformedStrikes, SessionHandle};

use super::router::{MessageRouter, dispatch};

/// フレーム処理後に接続をどうするか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Close,
}

/// 受信フレーム処理のユースケース
pub struct ReceiveFrameUseCase {
    codec: Arc<dyn FrameCodec>,
    router: Arc<MessageRouter>,
}

impl ReceiveFrameUseCase {
    /// 新しい ReceiveFrameUseCase を作成
    pub fn new(codec: Arc<dyn FrameCodec>, router: Arc<MessageRouter>) -> Self {
        Self { codec, router }
    }

    /// テキストフレーム 1 件を処理
    pub async fn execute(
        &self,
        session: &SessionHandle,
        raw: &str,
        strikes: &mut MalformedStrikes,
    ) -> FrameOutcome {
        let envelope = match self.codec.decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => return self.reject_malformed(session, e, strikes),
        };
        strikes.reset();

        match self.router.route(envelope, session).await {
            Ok(outcome) => {
                let report = dispatch(self.codec.as_ref(), outcome.deliveries);
                tracing::debug!(
                    "Routed frame from '{}': {} queued, {} dropped, {} evicted",
                    session.identity(),
                    report.queued,
                    report.dropped,
                    report.evicted
                );
                if outcome.end_session {
                    tracing::info!("'{}' left the chat", session.identity());
                    FrameOutcome::Close
                } else {
                    FrameOutcome::Continue
                }
            }
            Err(e) => {
                tracing::warn!("Rejected frame from '{}': {}", session.identity(), e);
                self.reply_error(session, e.to_string());
                if e.is_fatal() {
                    FrameOutcome::Close
                } else {
                    FrameOutcome::Continue
                }
            }
        }
    }

    /// 不正フレームを記録し、Error を返信する
    pub fn reject_malformed(
        &self,
        session: &SessionHandle,
        error: DecodeError,
        strikes: &mut MalformedStrikes,
    ) -> FrameOutcome {
        let limit_reached = strikes.record();
        tracing::warn!(
            "Malformed frame from '{}' ({} in a row): {}",
            session.identity(),
            strikes.consecutive(),
            error
        );
        if limit_reached {
            self.reply_error(
                session,
                format!(
                    "{error} (closing after {} consecutive malformed frames)",
                    strikes.consecutive()
                ),
            );
            FrameOutcome::Close
        } else {
            self.reply_error(session, error.to_string());
            FrameOutcome::Continue
        }
    }

    /// トランスポートが読めなかったフレーム: Error を返信して必ず閉じる
    ///
    /// フレーム境界を失っているため、連続回数に関係なく接続は継続できない。
    pub fn reject_unreadable(&self, session: &SessionHandle, error: DecodeError) -> FrameOutcome {
        tracing::warn!("Unreadable frame from '{}': {}", session.identity(), error);
        self.reply_error(session, error.to_string());
        FrameOutcome::Close
    }

    fn reply_error(&self, session: &SessionHandle, body: String) {
        let envelope = Envelope::error(body, self.router.now());
        if let Err(e) = session.enqueue(self.codec.encode(&envelope)) {
            tracing::warn!("Could not queue error reply: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{EnvelopeKind, RoomDirectory, RoomName, SessionRegistry},
        usecase::test_support::{Fixture, identity},
    };

    fn create_usecase(fixture: &Fixture) -> ReceiveFrameUseCase {
        ReceiveFrameUseCase::new(fixture.codec.clone(), fixture.router.clone())
    }

    #[tokio::test]
    async fn test_valid_chat_is_routed() {
        // テスト項目: 正常な Chat は他のセッションに配送される
        // given (前提条件):
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, _rx_a) = fixture.connect("alice").await;
        let (_bob, mut rx_b) = fixture.connect("bob").await;
        let mut strikes = MalformedStrikes::new(3);

        // when (操作):
        let outcome = usecase
            .execute(
                &alice,
                r#"{"type":"Chat","sender":"alice","body":"hi"}"#,
                &mut strikes,
            )
            .await;

        // then (期待する結果):
        assert_eq!(outcome, FrameOutcome::Continue);
        let received = fixture.drain(&mut rx_b);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "hi");
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_and_leaves_state_unchanged() {
        // テスト項目: type 欠落のフレームには Error が返り、Registry / Directory は変化しない
        // given (前提条件):
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, mut rx_a) = fixture.connect("alice").await;
        let mut strikes = MalformedStrikes::new(3);

        // when (操作):
        let outcome = usecase
            .execute(&alice, r#"{"room":"R1","body":"no type"}"#, &mut strikes)
            .await;

        // then (期待する結果):
        assert_eq!(outcome, FrameOutcome::Continue);
        let replies = fixture.drain(&mut rx_a);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind, EnvelopeKind::Error);
        assert!(replies[0].body.contains("missing required field 'type'"));
        assert_eq!(fixture.registry.list_active().await, vec![identity("alice")]);
        assert!(fixture.rooms.rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_three_consecutive_malformed_frames_close() {
        // テスト項目: 連続 3 件の不正フレームで Close になる
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, mut rx_a) = fixture.connect("alice").await;
        let mut strikes = MalformedStrikes::new(3);

        let first = usecase.execute(&alice, "garbage", &mut strikes).await;
        let second = usecase.execute(&alice, "{", &mut strikes).await;
        let third = usecase.execute(&alice, "[]", &mut strikes).await;

        assert_eq!(first, FrameOutcome::Continue);
        assert_eq!(second, FrameOutcome::Continue);
        assert_eq!(third, FrameOutcome::Close);
        let replies = fixture.drain(&mut rx_a);
        assert_eq!(replies.len(), 3);
        assert!(replies[2].body.contains("closing after 3"));
    }

    #[tokio::test]
    async fn test_unreadable_frame_gets_error_then_close() {
        // テスト項目: トランスポートが読めなかったフレームは 1 件目でも Error を返して Close
        // given (前提条件):
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, mut rx_a) = fixture.connect("alice").await;

        // when (操作):
        let outcome = usecase.reject_unreadable(
            &alice,
            DecodeError::Unreadable("message too long".to_string()),
        );

        // then (期待する結果):
        assert_eq!(outcome, FrameOutcome::Close);
        let replies = fixture.drain(&mut rx_a);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind, EnvelopeKind::Error);
        assert_eq!(
            replies[0].body,
            "malformed frame: unreadable frame: message too long"
        );
    }

    #[tokio::test]
    async fn test_valid_frame_resets_malformed_streak() {
        // テスト項目: 正常なフレームを挟むと連続回数がリセットされる
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, _rx_a) = fixture.connect("alice").await;
        let mut strikes = MalformedStrikes::new(3);

        usecase.execute(&alice, "bad", &mut strikes).await;
        usecase.execute(&alice, "bad", &mut strikes).await;
        usecase
            .execute(&alice, r#"{"type":"Chat","body":"ok"}"#, &mut strikes)
            .await;
        let outcome = usecase.execute(&alice, "bad", &mut strikes).await;

        assert_eq!(outcome, FrameOutcome::Continue);
        assert_eq!(strikes.consecutive(), 1);
    }

    #[tokio::test]
    async fn test_not_a_member_keeps_connection() {
        // テスト項目: 非メンバーのルーム送信は Error 返信のみで接続は維持される
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, mut rx_a) = fixture.connect("alice").await;
        let mut strikes = MalformedStrikes::new(3);

        let outcome = usecase
            .execute(
                &alice,
                r#"{"type":"Chat","sender":"alice","room":"R1","body":"x"}"#,
                &mut strikes,
            )
            .await;

        assert_eq!(outcome, FrameOutcome::Continue);
        let replies = fixture.drain(&mut rx_a);
        assert!(replies[0].body.contains("not a member"));
        assert!(alice.is_active());
    }

    #[tokio::test]
    async fn test_spoofed_sender_closes_after_error() {
        // テスト項目: 送信者詐称は Error 返信の後 Close
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, mut rx_a) = fixture.connect("alice").await;
        let (_bob, mut rx_b) = fixture.connect("bob").await;
        let mut strikes = MalformedStrikes::new(3);

        let outcome = usecase
            .execute(
                &alice,
                r#"{"type":"Chat","sender":"bob","body":"it's me"}"#,
                &mut strikes,
            )
            .await;

        assert_eq!(outcome, FrameOutcome::Close);
        assert_eq!(fixture.drain(&mut rx_a)[0].kind, EnvelopeKind::Error);
        assert!(fixture.drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_room_join_frame_updates_directory() {
        // テスト項目: ルーム Join フレームで Directory が更新される
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (bob, mut rx_b) = fixture.connect("bob").await;
        let mut strikes = MalformedStrikes::new(3);

        usecase
            .execute(&bob, r#"{"type":"Join","room":"R1","body":""}"#, &mut strikes)
            .await;

        let r1 = RoomName::try_from("R1").unwrap();
        assert!(fixture.rooms.is_member(&r1, &identity("bob")).await);
        assert_eq!(fixture.drain(&mut rx_b)[0].body, "bob joined");
    }

    #[tokio::test]
    async fn test_global_leave_frame_closes() {
        // テスト項目: room なしの Leave フレームで Close
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, _rx_a) = fixture.connect("alice").await;
        let mut strikes = MalformedStrikes::new(3);

        let outcome = usecase
            .execute(&alice, r#"{"type":"Leave","body":""}"#, &mut strikes)
            .await;

        assert_eq!(outcome, FrameOutcome::Close);
    }

    #[tokio::test]
    async fn test_per_sender_order_is_preserved() {
        // テスト項目: 同一送信者のメッセージは送信順に受信者へ届く
        let fixture = Fixture::new();
        let usecase = create_usecase(&fixture);
        let (alice, _rx_a) = fixture.connect("alice").await;
        let (_bob, mut rx_b) = fixture.connect("bob").await;
        let mut strikes = MalformedStrikes::new(3);

        for i in 0..10 {
            let raw = format!(r#"{{"type":"Chat","body":"m{i}"}}"#);
            usecase.execute(&alice, &raw, &mut strikes).await;
        }

        let bodies: Vec<String> = fixture
            .drain(&mut rx_b)
            .into_iter()
            .map(|envelope| envelope.body)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(bodies, expected);
    }
}
