//! End-to-end tests against an in-process server bound to an ephemeral port.

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use kchat_server::{
    BoundServer, Server, ServerConfig, ServerError, ServerHandle, ServerPhase,
    domain::RoomRetention,
    infrastructure::dto::http::{HealthDto, RoomDetailDto, RoomSummaryDto, UsersDto},
    usecase::DrainReport,
};
use serde_json::{Value, json};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Helper struct to manage an in-process server
struct TestServer {
    addr: SocketAddr,
    handle: ServerHandle,
    task: JoinHandle<Result<DrainReport, ServerError>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    async fn start_with(config: ServerConfig) -> Self {
        let server = Server::new(ServerConfig { port: 0, ..config }).unwrap();
        let bound: BoundServer = server.bind().await.unwrap();
        let addr = bound.local_addr();
        let handle = bound.handle();
        let task = tokio::spawn(bound.run_until(std::future::pending()));

        let mut phase = handle.subscribe_phase();
        phase
            .wait_for(|phase| *phase >= ServerPhase::Listening)
            .await
            .unwrap();

        TestServer { addr, handle, task }
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connect(&self) -> Ws {
        let (ws, _) = connect_async(self.ws_url()).await.unwrap();
        ws
    }

    /// Connect and complete the handshake as `name`
    async fn join(&self, name: &str) -> Ws {
        let mut ws = self.connect().await;
        send(&mut ws, json!({"type": "Join", "sender": name, "body": ""})).await;
        let welcome = recv(&mut ws).await.expect("no handshake reply");
        assert_eq!(welcome["type"], "Presence");
        assert_eq!(welcome["body"], "welcome");
        ws
    }

    async fn users(&self) -> UsersDto {
        reqwest::get(self.http_url("/api/users"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn shutdown(self) -> DrainReport {
        self.handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap()
    }
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn send_raw(ws: &mut Ws, raw: &str) {
    ws.send(Message::text(raw.to_string())).await.unwrap();
}

/// Next JSON frame, or `None` once the server closed the connection
async fn recv(ws: &mut Ws) -> Option<Value> {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).unwrap());
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(other)) => panic!("unexpected message: {other:?}"),
        }
    }
}

/// Skip frames until one matches `pred`
async fn recv_until(ws: &mut Ws, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let frame = recv(ws).await.expect("connection closed");
        if pred(&frame) {
            return frame;
        }
    }
}

/// Assert that no Chat frame arrives within `window`
async fn assert_no_chat(ws: &mut Ws, window: Duration) {
    while let Ok(Some(Ok(msg))) = tokio::time::timeout(window, ws.next()).await {
        if let Message::Text(text) = msg {
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_ne!(frame["type"], "Chat", "unexpected chat: {frame}");
        }
    }
}

fn is_type(kind: &'static str) -> impl Fn(&Value) -> bool {
    move |frame| frame["type"] == kind
}

#[tokio::test]
async fn test_global_and_room_scenario() {
    // テスト項目: alice はグローバル、bob は R1 に参加。グローバル Chat は bob に届き、
    //            R1 への Chat は alice が非メンバーのため "not a member" で拒否される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;
    send(&mut bob, json!({"type": "Join", "room": "R1", "body": ""})).await;
    let joined = recv_until(&mut bob, |f| f["room"] == "R1").await;
    assert_eq!(joined["type"], "Presence");
    assert_eq!(joined["body"], "bob joined");

    // when (操作): グローバル Chat
    send(&mut alice, json!({"type": "Chat", "sender": "alice", "body": "hi", "ts": 1})).await;

    // then (期待する結果): bob に届く（送信者と時刻はサーバーが刻印）
    let chat = recv_until(&mut bob, is_type("Chat")).await;
    assert_eq!(chat["sender"], "alice");
    assert_eq!(chat["body"], "hi");
    assert!(chat.get("room").is_none());
    assert!(chat["ts"].as_i64().unwrap() > 1);

    // when (操作): 参加していない R1 への Chat
    send(&mut alice, json!({"type": "Chat", "sender": "alice", "room": "R1", "body": "psst"})).await;

    // then (期待する結果): alice にだけ Error、bob には届かない
    let error = recv_until(&mut alice, is_type("Error")).await;
    assert!(error["body"].as_str().unwrap().contains("not a member"));
    assert_no_chat(&mut bob, Duration::from_millis(200)).await;

    // 最終状態: Registry = {alice, bob}、R1 = {bob}
    let users = server.users().await;
    let names: Vec<&str> = users.users.iter().map(|u| u.identity.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
    let room: RoomDetailDto = reqwest::get(server.http_url("/api/rooms/R1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(room.members, vec!["bob"]);

    // alice の接続は維持されている
    send(&mut alice, json!({"type": "Chat", "body": "still here"})).await;
    let chat = recv_until(&mut bob, is_type("Chat")).await;
    assert_eq!(chat["body"], "still here");
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    // テスト項目: 同じ名前の 2 つ目の接続は "name taken" で閉じられ、1 つ目は影響を受けない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut first = server.join("alice").await;

    // when (操作):
    let mut second = server.connect().await;
    send(&mut second, json!({"type": "Join", "sender": "alice", "body": ""})).await;

    // then (期待する結果):
    let reply = recv(&mut second).await.unwrap();
    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["body"], "name taken");
    assert!(recv(&mut second).await.is_none());

    assert_eq!(server.users().await.count, 1);
    let mut bob = server.join("bob").await;
    send(&mut first, json!({"type": "Chat", "body": "hello bob"})).await;
    let chat = recv_until(&mut bob, is_type("Chat")).await;
    assert_eq!(chat["sender"], "alice");
}

#[tokio::test]
async fn test_first_frame_must_be_join() {
    // テスト項目: 最初のフレームが Join 以外ならプロトコル違反として閉じられる
    let server = TestServer::start().await;
    let mut ws = server.connect().await;

    send(&mut ws, json!({"type": "Chat", "sender": "mallory", "body": "hi"})).await;

    let reply = recv(&mut ws).await.unwrap();
    assert_eq!(reply["type"], "Error");
    assert!(reply["body"].as_str().unwrap().contains("protocol violation"));
    assert!(recv(&mut ws).await.is_none());
    assert_eq!(server.users().await.count, 0);
}

#[tokio::test]
async fn test_handshake_timeout_closes_connection() {
    // テスト項目: 制限時間内に Join が来なければ閉じられる
    let server = TestServer::start_with(ServerConfig {
        handshake_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    })
    .await;
    let mut ws = server.connect().await;

    let reply = recv(&mut ws).await.unwrap();

    assert_eq!(reply["type"], "Error");
    assert!(recv(&mut ws).await.is_none());
}

#[tokio::test]
async fn test_malformed_frames() {
    // テスト項目: 不正フレーム 1 件は Error のみ、連続 3 件で接続が閉じられる
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.join("alice").await;

    // when (操作): 1 件だけ不正、その後は正常
    send_raw(&mut alice, r#"{"sender":"alice","body":"no type"}"#).await;
    let error = recv(&mut alice).await.unwrap();
    assert_eq!(error["type"], "Error");
    assert!(error["body"].as_str().unwrap().contains("type"));
    send(&mut alice, json!({"type": "Join", "room": "lobby", "body": ""})).await;
    let joined = recv(&mut alice).await.unwrap();
    assert_eq!(joined["type"], "Presence");

    // Registry / Room Directory は不正フレームで変化しない
    assert_eq!(server.users().await.count, 1);

    // when (操作): 連続 3 件
    for _ in 0..3 {
        send_raw(&mut alice, "not json").await;
    }

    // then (期待する結果):
    for _ in 0..3 {
        assert_eq!(recv(&mut alice).await.unwrap()["type"], "Error");
    }
    assert!(recv(&mut alice).await.is_none());
}

#[tokio::test]
async fn test_oversized_frame_gets_error_before_close() {
    // テスト項目: トランスポートの上限を超えるフレームにも Error を返してから閉じる
    // given (前提条件):
    let config = ServerConfig::default();
    let oversized = "x".repeat(config.max_frame_len() + 1024);
    let server = TestServer::start_with(config).await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    // when (操作):
    send(&mut alice, json!({"type": "Chat", "body": oversized})).await;

    // then (期待する結果):
    let error = recv_until(&mut alice, is_type("Error")).await;
    assert!(error["body"].as_str().unwrap().contains("unreadable frame"));
    assert!(recv(&mut alice).await.is_none());
    recv_until(&mut bob, |f| f["body"] == "alice left").await;
    assert_no_chat(&mut bob, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_slow_reader_is_evicted_and_sender_stays() {
    // テスト項目: 読まない受信者はキューが溢れて切断され、送信者の接続は維持される
    // given (前提条件): bob は一切読まない。ソケットのバッファを埋められる大きさで送る
    let server = TestServer::start_with(ServerConfig {
        max_body_len: 64 * 1024,
        queue_capacity: 4,
        ..ServerConfig::default()
    })
    .await;
    let mut alice = server.join("alice").await;
    let bob = server.join("bob").await;

    // when (操作): 合計 24 MiB 程度を送る
    let body = "y".repeat(60 * 1024);
    for _ in 0..400 {
        send(&mut alice, json!({"type": "Chat", "body": body})).await;
    }

    // then (期待する結果): bob だけが Registry から消える
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let users = server.users().await;
        if users.count == 1 {
            assert_eq!(users.users[0].identity, "alice");
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "slow reader was never evicted"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let left = recv_until(&mut alice, |f| f["body"] == "bob left").await;
    assert_eq!(left["type"], "Presence");

    // alice はそのまま送信でき、bob の名前は再び使える
    drop(bob);
    let mut bob_again = server.join("bob").await;
    send(&mut alice, json!({"type": "Chat", "body": "still here"})).await;
    let chat = recv_until(&mut bob_again, is_type("Chat")).await;
    assert_eq!(chat["sender"], "alice");
    assert_eq!(chat["body"], "still here");
}

#[tokio::test]
async fn test_spoofed_sender_closes_session() {
    // テスト項目: 他人の名前を騙った送信は Error の後に切断される
    let server = TestServer::start().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    send(&mut alice, json!({"type": "Chat", "sender": "bob", "body": "i am bob"})).await;

    let error = recv_until(&mut alice, is_type("Error")).await;
    assert!(error["body"].as_str().unwrap().contains("does not match"));
    assert!(recv(&mut alice).await.is_none());
    let left = recv_until(&mut bob, |f| f["body"] == "alice left").await;
    assert_eq!(left["type"], "Presence");
}

#[tokio::test]
async fn test_per_sender_ordering() {
    // テスト項目: 同じ送信者のメッセージは送信順に届く
    let server = TestServer::start().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    for i in 0..50 {
        send(&mut alice, json!({"type": "Chat", "body": format!("m{i}")})).await;
    }

    for i in 0..50 {
        let chat = recv_until(&mut bob, is_type("Chat")).await;
        assert_eq!(chat["body"], format!("m{i}"));
    }
}

#[tokio::test]
async fn test_room_presence_and_scoping() {
    // テスト項目: ルームの参加・退出は Presence で通知され、ルーム Chat はメンバーにだけ届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut bob = server.join("bob").await;
    let mut carol = server.join("carol").await;
    let mut dave = server.join("dave").await;
    send(&mut bob, json!({"type": "Join", "room": "R1", "body": ""})).await;
    recv_until(&mut bob, |f| f["body"] == "bob joined" && f["room"] == "R1").await;

    // when (操作): carol が R1 に参加して発言
    send(&mut carol, json!({"type": "Join", "room": "R1", "body": ""})).await;
    let presence = recv_until(&mut bob, |f| f["room"] == "R1").await;
    assert_eq!(presence["body"], "carol joined");
    send(&mut carol, json!({"type": "Chat", "room": "R1", "body": "room only"})).await;

    // then (期待する結果):
    let chat = recv_until(&mut bob, is_type("Chat")).await;
    assert_eq!(chat["room"], "R1");
    assert_eq!(chat["sender"], "carol");
    assert_no_chat(&mut dave, Duration::from_millis(200)).await;

    // carol の退出
    send(&mut carol, json!({"type": "Leave", "room": "R1", "body": ""})).await;
    let presence = recv_until(&mut bob, |f| f["room"] == "R1").await;
    assert_eq!(presence["body"], "carol left");
    let rooms: Vec<RoomSummaryDto> = reqwest::get(server.http_url("/api/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        rooms,
        vec![RoomSummaryDto {
            name: "R1".to_string(),
            member_count: 1
        }]
    );
}

#[tokio::test]
async fn test_retained_room_survives_last_leave() {
    // テスト項目: retain-empty では最後のメンバーが抜けてもルームが残る
    let server = TestServer::start_with(ServerConfig {
        room_retention: RoomRetention::RetainEmpty,
        ..ServerConfig::default()
    })
    .await;
    let mut bob = server.join("bob").await;
    send(&mut bob, json!({"type": "Join", "room": "R1", "body": ""})).await;
    recv_until(&mut bob, |f| f["body"] == "bob joined").await;
    send(&mut bob, json!({"type": "Leave", "room": "R1", "body": ""})).await;
    recv_until(&mut bob, |f| f["body"] == "bob left").await;

    let response = reqwest::get(server.http_url("/api/rooms/R1")).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let room: RoomDetailDto = response.json().await.unwrap();
    assert!(room.members.is_empty());
}

#[tokio::test]
async fn test_disconnect_broadcasts_left() {
    // テスト項目: 切断すると残りのセッションに "left" が届き、一覧から消える
    let server = TestServer::start().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    bob.close(None).await.unwrap();

    let left = recv_until(&mut alice, |f| f["body"] == "bob left").await;
    assert_eq!(left["type"], "Presence");
    let users = server.users().await;
    assert_eq!(users.count, 1);
    assert_eq!(users.users[0].identity, "alice");
    drop(bob);
}

#[tokio::test]
async fn test_global_leave_ends_session() {
    // テスト項目: room なしの Leave は正常終了として切断される
    let server = TestServer::start().await;
    let mut alice = server.join("alice").await;
    let mut bob = server.join("bob").await;

    send(&mut bob, json!({"type": "Leave", "body": ""})).await;

    assert!(recv(&mut bob).await.is_none());
    recv_until(&mut alice, |f| f["body"] == "bob left").await;
}

#[tokio::test]
async fn test_http_api_health_and_unknown_room() {
    let server = TestServer::start().await;

    let health: HealthDto = reqwest::get(server.http_url("/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.phase, "listening");

    let response = reqwest::get(server.http_url("/api/rooms/nowhere")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shutdown_drains_ten_sessions() {
    // テスト項目: 10 セッションが接続中のシャットダウンは、全員に通知して制限時間内に完了する
    // given (前提条件):
    let server = TestServer::start().await;
    let mut clients = Vec::new();
    for i in 0..10 {
        clients.push(server.join(&format!("user{i}")).await);
    }
    let handle = server.handle.clone();
    let addr = server.addr;

    // when (操作):
    let started = std::time::Instant::now();
    let readers = tokio::spawn(async move {
        for mut ws in clients {
            let notice = recv_until(&mut ws, |f| f["body"] == "server shutting down").await;
            assert_eq!(notice["type"], "Presence");
            assert!(recv(&mut ws).await.is_none());
        }
    });
    let report = server.shutdown().await;

    // then (期待する結果):
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.notified, 10);
    assert_eq!(report.remaining, 0);
    assert!(!report.timed_out);
    assert_eq!(handle.phase(), ServerPhase::Stopped);
    readers.await.unwrap();

    // 停止後は新しい接続を受け付けない
    assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());
}
