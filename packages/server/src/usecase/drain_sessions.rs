//! UseCase: シャットダウン時のセッションのドレイン
//!
//! 全アクティブセッションに "server shutting down" を通知してから Closing に移し、
//! 各セッションの送信タスクがキューを吐き出して切断するのを待ちます。
//! 待ち時間は上限付きで、超過した場合は残りのセッション数を報告します。

use std::{sync::Arc, time::Duration};

use crate::domain::{Envelope, FrameCodec, SessionRegistry, envelope::SHUTDOWN_BODY};

use super::router::MessageRouter;

/// ドレイン結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// シャットダウン通知を積んだセッション数
    pub notified: usize,
    /// 待機終了時点で Registry に残っていたセッション数
    pub remaining: usize,
    /// 上限時間に達したか
    pub timed_out: bool,
}

/// ドレインのユースケース
pub struct DrainSessionsUseCase {
    registry: Arc<dyn SessionRegistry>,
    router: Arc<MessageRouter>,
    codec: Arc<dyn FrameCodec>,
}

impl DrainSessionsUseCase {
    /// 新しい DrainSessionsUseCase を作成
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        router: Arc<MessageRouter>,
        codec: Arc<dyn FrameCodec>,
    ) -> Self {
        Self {
            registry,
            router,
            codec,
        }
    }

    /// 全セッションへ通知して Closing に移す（待機はしない）
    pub async fn notify_all(&self) -> usize {
        let frame = self
            .codec
            .encode(&Envelope::presence(None, SHUTDOWN_BODY, self.router.now()));
        let sessions = self.registry.active_sessions().await;
        let mut notified = 0;
        for session in &sessions {
            match session.enqueue(frame.clone()) {
                Ok(_) => notified += 1,
                Err(e) => tracing::warn!("Could not queue shutdown notice: {}", e),
            }
            session.begin_close();
        }
        notified
    }

    /// ドレインを実行
    ///
    /// # Arguments
    ///
    /// * `timeout` - 全セッションの切断を待つ上限時間
    pub async fn execute(&self, timeout: Duration) -> DrainReport {
        let mut count = self.registry.watch_count();
        let notified = self.notify_all().await;
        tracing::info!("Draining {} session(s)", notified);

        let timed_out = tokio::time::timeout(timeout, async {
            // Sender が落ちた場合もこれ以上待つ意味はない
            let _ = count.wait_for(|remaining| *remaining == 0).await;
        })
        .await
        .is_err();

        let remaining = self.registry.count().await;
        if timed_out {
            tracing::warn!(
                "Drain timed out after {:?}, {} session(s) still open",
                timeout,
                remaining
            );
        } else {
            tracing::info!("All sessions drained");
        }

        DrainReport {
            notified,
            remaining,
            timed_out,
        }
    }
}
