//! Data Transfer Objects (DTOs) for the chat server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: the JSON frame carried in WebSocket text messages
//! - `http`: HTTP API response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
