//! Shared utilities for the kchat server and client.

pub mod logger;
pub mod time;
