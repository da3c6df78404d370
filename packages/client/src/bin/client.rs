//! Terminal chat client with reconnection support.
//!
//! Connects to a kchat server, registers under `--name` and sends what you
//! type. `/join R`, `/leave R`, `/room R`, `/global` and `/quit` control rooms.
//! Reconnects on connection loss (max 5 attempts with 5 second interval) but
//! exits at once if the name is taken.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kchat-client -- --name alice
//! cargo run --bin kchat-client -- -n bob --room R1
//! cargo run --bin kchat-client -- -n carol --embedded-server --port 9000
//! ```

use clap::Parser;

use kchat_client::{embedded::EmbeddedServer, runner::run_client};
use kchat_server::{
    ServerConfig,
    domain::{Identity, RoomName},
};
use kchat_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kchat-client")]
#[command(about = "Terminal client for the kchat WebSocket chat server", long_about = None)]
struct Args {
    /// Name to register under (must be unique on the server)
    #[arg(short = 'n', long)]
    name: String,

    /// Room to join right after connecting
    #[arg(short = 'r', long)]
    room: Option<String>,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Run the server in this process and connect to it
    #[arg(long)]
    embedded_server: bool,

    /// Bind address of the embedded server
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the embedded server (0 = ephemeral)
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

fn fail(message: impl std::fmt::Display) -> ! {
    tracing::error!("{}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let identity = Identity::try_from(args.name.as_str())
        .unwrap_or_else(|e| fail(format!("Invalid name '{}': {}", args.name, e)));
    let room = match args.room.as_deref().map(RoomName::try_from) {
        None => None,
        Some(Ok(room)) => Some(room),
        Some(Err(e)) => fail(format!("Invalid room: {}", e)),
    };

    let embedded = if args.embedded_server {
        let config = ServerConfig {
            host: args.host,
            port: args.port,
            ..ServerConfig::default()
        };
        match EmbeddedServer::start(config).await {
            Ok(server) => Some(server),
            Err(e) => fail(format!("Server error: {}", e)),
        }
    } else {
        None
    };
    let url = embedded
        .as_ref()
        .map_or(args.url, |server| server.url().to_string());

    // Run the client
    let result = run_client(url, identity, room).await;

    if let Some(server) = embedded
        && let Err(e) = server.stop().await
    {
        tracing::warn!("Embedded server stopped with error: {}", e);
    }

    match result {
        // readline スレッドの終了を待たずに抜ける
        Ok(()) => std::process::exit(0),
        Err(e) => fail(format!("Client error: {}", e)),
    }
}
