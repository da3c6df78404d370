//! Server state shared by the handlers.

use std::{fmt, sync::Arc};

use tokio::sync::watch;

use crate::{
    config::ServerConfig,
    usecase::{
        ConnectSessionUseCase, DisconnectSessionUseCase, DrainSessionsUseCase,
        GetPresenceUseCase, GetRoomsUseCase, ReceiveFrameUseCase,
    },
};

/// Server-wide lifecycle: `Starting → Listening → Draining → Stopped`.
///
/// Phases only move forward, so `>=` comparisons are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerPhase {
    Starting,
    Listening,
    Draining,
    Stopped,
}

impl ServerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerPhase::Starting => "starting",
            ServerPhase::Listening => "listening",
            ServerPhase::Draining => "draining",
            ServerPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    /// 現在のフェーズ（前進のみ）
    pub phase: watch::Sender<ServerPhase>,
    /// ConnectSessionUseCase（ハンドシェイクのユースケース）
    pub connect_session_usecase: Arc<ConnectSessionUseCase>,
    /// ReceiveFrameUseCase（受信フレーム処理のユースケース）
    pub receive_frame_usecase: Arc<ReceiveFrameUseCase>,
    /// DisconnectSessionUseCase（切断のユースケース）
    pub disconnect_session_usecase: Arc<DisconnectSessionUseCase>,
    /// DrainSessionsUseCase（シャットダウン時のドレイン）
    pub drain_sessions_usecase: Arc<DrainSessionsUseCase>,
    /// GetPresenceUseCase（参加者一覧）
    pub get_presence_usecase: Arc<GetPresenceUseCase>,
    /// GetRoomsUseCase（ルーム一覧・詳細）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
}

impl AppState {
    pub fn phase(&self) -> ServerPhase {
        *self.phase.borrow()
    }

    /// Move the phase forward to `next`. Returns `false` if already there or past it.
    pub fn advance(&self, next: ServerPhase) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase < next {
                tracing::info!("Server phase: {} -> {}", phase, next);
                *phase = next;
                true
            } else {
                false
            }
        })
    }
}

/// Wait until the phase reaches at least `target`.
///
/// Also returns if the phase sender is dropped.
pub async fn wait_for_phase(mut rx: watch::Receiver<ServerPhase>, target: ServerPhase) {
    let _ = rx.wait_for(|phase| *phase >= target).await;
}
