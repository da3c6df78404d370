//! Terminal chat client for the kchat WebSocket server.
//!
//! Speaks the JSON envelope protocol, reconnects on connection loss and can
//! host the server in-process (`--embedded-server`).

pub mod command;
pub mod domain;
pub mod embedded;
pub mod error;
pub mod formatter;
pub mod runner;
pub mod session;
mod ui;
