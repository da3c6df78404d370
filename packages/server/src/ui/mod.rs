//! WebSocket chat server controller.

pub mod control;
mod handler;
mod server;
mod signal;
pub mod state;

pub use control::OperatorCommand;
pub use server::{BoundServer, Server, ServerHandle};
pub use signal::shutdown_signal;
pub use state::ServerPhase;
