//! In-memory implementations guarded by a single mutex each.

pub mod room_directory;
pub mod session_registry;

pub use room_directory::InMemoryRoomDirectory;
pub use session_registry::InMemorySessionRegistry;
