//! WebSocket chat server library.
//!
//! Accepts WebSocket connections, registers each one under a unique display
//! name, and routes JSON chat envelopes globally or within named rooms.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
pub mod error;

pub use config::ServerConfig;
pub use error::ServerError;
pub use ui::{BoundServer, Server, ServerHandle, ServerPhase};
