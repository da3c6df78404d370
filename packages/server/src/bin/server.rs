//! WebSocket chat server.
//!
//! Accepts WebSocket connections on `/ws`, registers each under a unique name
//! and routes chat envelopes globally or within rooms. Type `shutdown` on stdin
//! (or press Ctrl+C) to drain the sessions and stop.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kchat-server
//! cargo run --bin kchat-server -- --host 0.0.0.0 --port 3000 --room-retention retain-empty
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};

use kchat_server::{Server, ServerConfig, domain::RoomRetention};
use kchat_shared::logger::setup_logger;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RetentionArg {
    /// Retire a room when its last member leaves
    DestroyEmpty,
    /// Keep empty rooms as standing channels
    RetainEmpty,
}

impl From<RetentionArg> for RoomRetention {
    fn from(arg: RetentionArg) -> Self {
        match arg {
            RetentionArg::DestroyEmpty => RoomRetention::DestroyEmpty,
            RetentionArg::RetainEmpty => RoomRetention::RetainEmpty,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kchat-server")]
#[command(about = "WebSocket chat server with rooms, presence and graceful shutdown", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to (0 = ephemeral)
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Maximum body length per frame, in bytes
    #[arg(long, default_value = "4096")]
    max_body_len: usize,

    /// Outbound frames buffered per session before it is closed
    #[arg(long, default_value = "256")]
    queue_capacity: usize,

    /// Upper bound on the shutdown drain, in milliseconds
    #[arg(long, default_value = "2000")]
    drain_timeout_ms: u64,

    /// Time allowed for the first Join frame, in milliseconds
    #[arg(long, default_value = "10000")]
    handshake_timeout_ms: u64,

    /// Consecutive malformed frames before the session is closed
    #[arg(long, default_value = "3")]
    max_malformed: u32,

    /// What to do with a room once its last member leaves
    #[arg(long, value_enum, default_value = "destroy-empty")]
    room_retention: RetentionArg,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            max_body_len: args.max_body_len,
            queue_capacity: args.queue_capacity,
            drain_timeout: Duration::from_millis(args.drain_timeout_ms),
            handshake_timeout: Duration::from_millis(args.handshake_timeout_ms),
            max_malformed: args.max_malformed,
            room_retention: args.room_retention.into(),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let server = match Server::new(args.into()) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    };

    match server.run().await {
        Ok(report) => {
            if report.timed_out {
                tracing::warn!("{} session(s) were closed forcibly", report.remaining);
            }
            // stdin の読み取りが残っていてもランタイムの終了を待たない
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    }
}
