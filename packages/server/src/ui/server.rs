//! Server controller: wiring, binding, serving and graceful drain.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
use kchat_shared::time::{Clock, SystemClock};
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerConfig,
    domain::{FrameCodec, Identity, Participant, Room, RoomDirectory, SessionRegistry},
    error::ServerError,
    infrastructure::{
        JsonFrameCodec,
        repository::{InMemoryRoomDirectory, InMemorySessionRegistry},
    },
    usecase::{
        ConnectSessionUseCase, DisconnectSessionUseCase, DrainReport, DrainSessionsUseCase,
        GetPresenceUseCase, GetRoomsUseCase, MessageRouter, ReceiveFrameUseCase,
    },
};

use super::{
    control::stdin_shutdown,
    handler::{get_room_detail, get_rooms, get_users, health_check, websocket_handler},
    signal::shutdown_signal,
    state::{AppState, ServerPhase, wait_for_phase},
};

/// WebSocket chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(ServerConfig::default())?;
/// let bound = server.bind().await?;
/// println!("listening on {}", bound.local_addr());
/// let report = bound.run_until(shutdown_signal()).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a server with the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the configuration is invalid.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Result<Self, ServerError> {
        config.validate()?;

        // Initialize dependencies in order:
        // 1. Repository
        // 2. Codec + Router
        // 3. UseCases
        // 4. AppState
        let registry: Arc<dyn SessionRegistry> = Arc::new(InMemorySessionRegistry::new());
        let rooms: Arc<dyn RoomDirectory> =
            Arc::new(InMemoryRoomDirectory::new(config.room_retention));

        let codec: Arc<dyn FrameCodec> = Arc::new(JsonFrameCodec::new(config.max_body_len));
        let router = Arc::new(MessageRouter::new(registry.clone(), rooms.clone(), clock));

        let connect_session_usecase = Arc::new(ConnectSessionUseCase::new(
            registry.clone(),
            router.clone(),
            codec.clone(),
            config.queue_capacity,
        ));
        let receive_frame_usecase =
            Arc::new(ReceiveFrameUseCase::new(codec.clone(), router.clone()));
        let disconnect_session_usecase = Arc::new(DisconnectSessionUseCase::new(
            registry.clone(),
            rooms.clone(),
            router.clone(),
            codec.clone(),
        ));
        let drain_sessions_usecase = Arc::new(DrainSessionsUseCase::new(
            registry.clone(),
            router,
            codec,
        ));
        let get_presence_usecase = Arc::new(GetPresenceUseCase::new(registry, rooms.clone()));
        let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(rooms));

        let (phase, _) = watch::channel(ServerPhase::Starting);
        let state = Arc::new(AppState {
            config,
            phase,
            connect_session_usecase,
            receive_frame_usecase,
            disconnect_session_usecase,
            drain_sessions_usecase,
            get_presence_usecase,
            get_rooms_usecase,
        });

        Ok(Self { state })
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: self.state.clone(),
        }
    }

    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.state.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(BoundServer {
            listener,
            local_addr,
            state: self.state,
        })
    }

    /// Bind and serve until Ctrl+C, SIGTERM or an operator `shutdown` on stdin.
    pub async fn run(self) -> Result<DrainReport, ServerError> {
        let bound = self.bind().await?;
        let handle = bound.handle();
        bound
            .run_until(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = stdin_shutdown(handle) => {}
                }
            })
            .await
    }
}

/// A server whose listener is bound but not yet serving.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<AppState>,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: self.state.clone(),
        }
    }

    /// Serve until `shutdown` resolves (or [`ServerHandle::shutdown`] is called),
    /// then drain the sessions and stop.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the accept loop fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<DrainReport, ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let state = self.state;
        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/users", get(get_users))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{name}", get(get_room_detail))
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());

        state.advance(ServerPhase::Listening);
        tracing::info!("WebSocket chat server listening on {}", self.local_addr);
        tracing::info!("Connect to: ws://{}/ws", self.local_addr);
        tracing::info!("Type 'shutdown' or press Ctrl+C to stop");

        // Draining になったら accept を止める
        let accept_phase = state.phase.subscribe();
        let mut serve_task = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(wait_for_phase(accept_phase, ServerPhase::Draining))
                .await
        });

        let requested = wait_for_phase(state.phase.subscribe(), ServerPhase::Draining);
        tokio::select! {
            _ = shutdown => {}
            _ = requested => {}
            result = &mut serve_task => {
                state.advance(ServerPhase::Stopped);
                return match result {
                    Ok(Ok(())) => Ok(DrainReport { notified: 0, remaining: 0, timed_out: false }),
                    Ok(Err(e)) => Err(ServerError::Io(e)),
                    Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
                };
            }
        }

        state.advance(ServerPhase::Draining);
        let report = state
            .drain_sessions_usecase
            .execute(state.config.drain_timeout)
            .await;

        // 残ったセッションはここで強制的に閉じられる
        state.advance(ServerPhase::Stopped);

        if tokio::time::timeout(state.config.drain_timeout, &mut serve_task)
            .await
            .is_err()
        {
            tracing::warn!("HTTP connections still open at stop; aborting");
            serve_task.abort();
        }

        tracing::info!(
            "Server shutdown complete ({} notified, {} forced)",
            report.notified,
            report.remaining
        );
        Ok(report)
    }
}

/// Cheap, cloneable view of a running server.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<AppState>,
}

impl ServerHandle {
    pub fn phase(&self) -> ServerPhase {
        self.state.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ServerPhase> {
        self.state.phase.subscribe()
    }

    /// Request a graceful shutdown (Listening → Draining).
    pub fn shutdown(&self) {
        self.state.advance(ServerPhase::Draining);
    }

    /// Wait until the server reaches `Stopped`.
    pub async fn stopped(&self) {
        wait_for_phase(self.subscribe_phase(), ServerPhase::Stopped).await;
    }

    /// Online identities, sorted.
    pub async fn online(&self) -> Vec<Identity> {
        self.participants()
            .await
            .into_iter()
            .map(|participant| participant.identity)
            .collect()
    }

    pub async fn participants(&self) -> Vec<Participant> {
        self.state.get_presence_usecase.execute().await
    }

    pub async fn rooms(&self) -> Vec<Room> {
        self.state.get_rooms_usecase.list().await
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}
