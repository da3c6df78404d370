//! Infrastructure layer: wire format and in-memory state.

pub mod codec;
pub mod dto;
pub mod repository;

pub use codec::JsonFrameCodec;
