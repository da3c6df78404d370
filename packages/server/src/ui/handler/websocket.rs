//! WebSocket connection handlers.
//!
//! 1 接続につき 3 つのタスクが動きます:
//!
//! - 受信タスク: フレームを 1 件ずつ [`ReceiveFrameUseCase`] に渡す
//! - 送信タスク: 自分のキューだけを待ち、ソケットへ書き込む
//! - 監督（`handle_socket` 自身）: どちらかの終了・Closing・サーバー停止を待って後始末
//!
//! [`ReceiveFrameUseCase`]: crate::usecase::ReceiveFrameUseCase

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    domain::{DecodeError, MalformedStrikes, SessionHandle, SessionState},
    ui::state::{AppState, ServerPhase, wait_for_phase},
    usecase::{ConnectError, FrameOutcome},
};

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let phase = state.phase();
    if phase != ServerPhase::Listening {
        tracing::warn!("Rejecting connection while {}", phase);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let max_frame_len = state.config.max_frame_len();
    ws.max_message_size(max_frame_len)
        .max_frame_size(max_frame_len)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// One inbound item, with control frames filtered out
enum Inbound {
    Text(String),
    Binary,
    /// The transport refused the frame (over the size limit or a protocol error)
    Unreadable(String),
    Closed,
}

async fn next_inbound(receiver: &mut WsReceiver) -> Inbound {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => return Inbound::Text(text.as_str().to_owned()),
            Ok(Message::Binary(_)) => return Inbound::Binary,
            Ok(Message::Close(_)) => return Inbound::Closed,
            // Ping/pong is handled automatically by the WebSocket protocol
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                tracing::debug!("WebSocket read error: {}", e);
                return Inbound::Unreadable(e.to_string());
            }
        }
    }
    Inbound::Closed
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // 1. ハンドシェイク（最初のフレームは Join）
    let timeout = state.config.handshake_timeout;
    let first = match tokio::time::timeout(timeout, next_inbound(&mut receiver)).await {
        Ok(Inbound::Text(raw)) => raw,
        Ok(Inbound::Binary) => {
            reject(&mut sender, &state, ConnectError::Decode(DecodeError::NotText)).await;
            return;
        }
        Ok(Inbound::Unreadable(reason)) => {
            let error = ConnectError::Decode(DecodeError::Unreadable(reason));
            reject(&mut sender, &state, error).await;
            return;
        }
        Ok(Inbound::Closed) => {
            tracing::debug!("Connection closed before handshake");
            return;
        }
        Err(_) => {
            reject(
                &mut sender,
                &state,
                ConnectError::HandshakeTimeout(timeout.as_millis()),
            )
            .await;
            return;
        }
    };

    let (session, rx) = match state.connect_session_usecase.execute(&first).await {
        Ok(pair) => pair,
        Err(e) => {
            reject(&mut sender, &state, e).await;
            return;
        }
    };

    // ハンドシェイク中にシャットダウンが始まった場合
    if state.phase() != ServerPhase::Listening {
        session.begin_close();
    }

    // 2. 送受信タスクを起動し、監督する
    let mut send_task = pusher_loop(rx, sender, session.clone());
    let mut recv_task = receive_loop(receiver, session.clone(), state.clone());
    let stopped = wait_for_phase(state.phase.subscribe(), ServerPhase::Stopped);
    // キュー溢れなどで Closing になった場合、送信タスクが書き込みで詰まっていても抜ける
    let closing = until_closing(session.subscribe_state());

    tokio::select! {
        _ = &mut recv_task => {}
        _ = &mut send_task => {}
        _ = closing => tracing::debug!("Session '{}' is closing", session.identity()),
        _ = stopped => tracing::warn!("Force closing '{}'", session.identity()),
    }

    // 3. 送信キューを吐き出してから閉じる
    session.begin_close();
    recv_task.abort();
    if !send_task.is_finished() {
        let flush = if state.phase() >= ServerPhase::Stopped {
            Duration::ZERO
        } else {
            state.config.drain_timeout
        };
        if tokio::time::timeout(flush, &mut send_task).await.is_err() {
            send_task.abort();
        }
    }
    session.mark_closed();

    // 4. Registry / Room Directory から削除し、退出を通知
    state.disconnect_session_usecase.execute(&session).await;
}

/// 接続拒否: Error を返してから Close する
async fn reject(sender: &mut WsSender, state: &AppState, error: ConnectError) {
    tracing::warn!("Handshake rejected: {}", error);
    let frame = state.connect_session_usecase.rejection_frame(&error);
    if sender.send(Message::Text(frame.into())).await.is_err() {
        return;
    }
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Utf8Bytes::from_static("handshake rejected"),
        })))
        .await;
}

async fn until_closing(mut state: watch::Receiver<SessionState>) {
    let _ = state.wait_for(SessionState::is_closing).await;
}

/// Spawns a task that receives frames from the session queue and pushes them to the WebSocket sender.
///
/// Once the session is Closing, frames already queued are flushed and a Close
/// frame is sent.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sender: WsSender,
    session: SessionHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let closing = until_closing(session.subscribe_state());
        tokio::pin!(closing);

        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                _ = &mut closing => break,
            }
        }

        while let Ok(frame) = rx.try_recv() {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: Utf8Bytes::from_static(""),
            })))
            .await;
        tracing::debug!("Writer for '{}' finished", session.identity());
    })
}

/// Spawns a task that decodes frames from this client in arrival order.
fn receive_loop(
    mut receiver: WsReceiver,
    session: SessionHandle,
    state: Arc<AppState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut strikes = MalformedStrikes::new(state.config.max_malformed);
        loop {
            let outcome = match next_inbound(&mut receiver).await {
                Inbound::Text(raw) => {
                    tracing::debug!("Received from '{}': {}", session.identity(), raw);
                    state
                        .receive_frame_usecase
                        .execute(&session, &raw, &mut strikes)
                        .await
                }
                Inbound::Binary => state.receive_frame_usecase.reject_malformed(
                    &session,
                    DecodeError::NotText,
                    &mut strikes,
                ),
                Inbound::Unreadable(reason) => state
                    .receive_frame_usecase
                    .reject_unreadable(&session, DecodeError::Unreadable(reason)),
                Inbound::Closed => {
                    tracing::info!("Client '{}' closed the connection", session.identity());
                    break;
                }
            };
            if outcome == FrameOutcome::Close {
                break;
            }
        }
    })
}
