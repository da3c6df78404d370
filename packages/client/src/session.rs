//! WebSocket client session management.

use std::time::Duration;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use kchat_server::{
    domain::{Envelope, EnvelopeKind, FrameCodec, Identity, RoomName, Timestamp},
    infrastructure::JsonFrameCodec,
};
use kchat_shared::time::get_timestamp_millis;
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::{
    command::{ClientCommand, HELP},
    error::ClientError,
    formatter::MessageFormatter,
    ui::redisplay_prompt,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const NAME_TAKEN: &str = "name taken";

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `/quit`
    Quit,
    /// Input closed (Ctrl+C / Ctrl+D)
    InputClosed,
}

fn now() -> Timestamp {
    Timestamp::new(get_timestamp_millis())
}

fn connection_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::ConnectionError(e.to_string())
}

async fn send_envelope(
    write: &mut WsWrite,
    codec: &JsonFrameCodec,
    envelope: &Envelope,
) -> Result<(), ClientError> {
    write
        .send(Message::text(codec.encode(envelope)))
        .await
        .map_err(connection_error)
}

/// Send the `Join` and wait for the server's verdict
pub async fn handshake(
    write: &mut WsWrite,
    read: &mut WsRead,
    codec: &JsonFrameCodec,
    identity: &Identity,
    room: Option<&RoomName>,
) -> Result<(), ClientError> {
    let join = Envelope::join(identity.clone(), room.cloned(), now());
    send_envelope(write, codec, &join).await?;

    let reply = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(text.as_str().to_owned()),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(connection_error(e)),
            }
        }
        Err(connection_error("closed during handshake"))
    })
    .await
    .map_err(|_| connection_error("handshake timed out"))??;

    let envelope = codec
        .decode(&reply)
        .map_err(|e| ClientError::Rejected(e.to_string()))?;
    match envelope.kind {
        EnvelopeKind::Presence if envelope.is_welcome() => Ok(()),
        EnvelopeKind::Error if envelope.body == NAME_TAKEN => {
            Err(ClientError::NameTaken(identity.to_string()))
        }
        _ => Err(ClientError::Rejected(envelope.body)),
    }
}

/// Spawns a task that prints everything the server sends.
///
/// Resolves to `true` if the connection was lost.
fn reader_loop(mut read: WsRead, identity: Identity, codec: JsonFrameCodec) -> JoinHandle<bool> {
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let formatted = match codec.decode(text.as_str()) {
                        Ok(envelope) => {
                            MessageFormatter::format_envelope(&envelope, identity.as_str())
                        }
                        Err(_) => MessageFormatter::format_raw_message(text.as_str()),
                    };
                    print!("{}", formatted);
                    redisplay_prompt(identity.as_str());
                }
                Ok(Message::Binary(data)) => {
                    print!("{}", MessageFormatter::format_binary_message(data.len()));
                    redisplay_prompt(identity.as_str());
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    return true;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return true;
                }
                _ => {}
            }
        }
        true
    })
}

/// Run the WebSocket client session
///
/// # Arguments
///
/// * `url` - WebSocket endpoint, e.g. `ws://127.0.0.1:8080/ws`
/// * `identity` - Name to register under
/// * `room` - Room to join during the handshake
/// * `input` - Lines typed by the user; shared across reconnects
pub async fn run_client_session(
    url: &str,
    identity: &Identity,
    room: Option<&RoomName>,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<SessionEnd, ClientError> {
    // 受信側はサーバーの設定に合わせられないので本文長を制限しない
    let codec = JsonFrameCodec::new(usize::MAX);
    let (ws_stream, _response) = connect_async(url).await.map_err(connection_error)?;
    let (mut write, mut read) = ws_stream.split();

    handshake(&mut write, &mut read, &codec, identity, room).await?;
    tracing::info!("Connected to chat server!");
    print!("{}", MessageFormatter::format_welcome(identity.as_str()));
    redisplay_prompt(identity.as_str());

    let mut read_task = reader_loop(read, identity.clone(), codec);
    let mut focus: Option<RoomName> = room.cloned();

    let result = loop {
        let line = tokio::select! {
            line = input.recv() => line,
            _ = &mut read_task => break Err(connection_error("Connection lost")),
        };

        let Some(line) = line else {
            // 入力が閉じられた: 退出してから終了する
            let leave = Envelope::leave(identity.clone(), None, now());
            let _ = send_envelope(&mut write, &codec, &leave).await;
            break Ok(SessionEnd::InputClosed);
        };

        let command = match ClientCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", MessageFormatter::format_error(&e.to_string()));
                redisplay_prompt(identity.as_str());
                continue;
            }
        };

        let sent_at = now();
        if let Some(envelope) = command.to_envelope(identity, focus.as_ref(), sent_at)
            && let Err(e) = send_envelope(&mut write, &codec, &envelope).await
        {
            tracing::warn!("Failed to send message: {}", e);
            break Err(e);
        }

        match command {
            ClientCommand::Quit => break Ok(SessionEnd::Quit),
            ClientCommand::Say(_) => {
                print!("{}", MessageFormatter::format_sent_confirmation(sent_at.value()));
            }
            ClientCommand::Join(room) | ClientCommand::Focus(room) => {
                println!("→ sending to #{}", room);
                focus = Some(room);
            }
            ClientCommand::Leave(room) => {
                if focus.as_ref() == Some(&room) {
                    println!("→ sending to everyone");
                    focus = None;
                }
            }
            ClientCommand::Global => {
                println!("→ sending to everyone");
                focus = None;
            }
            ClientCommand::Help => println!("{}", HELP),
        }
        redisplay_prompt(identity.as_str());
    };

    read_task.abort();
    if result.is_ok() {
        let _ = write.close().await;
    }
    result
}
