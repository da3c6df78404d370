//! Domain layer: value objects, envelopes, sessions and the repository
//! interfaces the use cases depend on.

pub mod codec;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod repository;
pub mod session;
pub mod value_object;

pub use codec::FrameCodec;
pub use entity::{Participant, Room, RoomRetention};
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{DecodeError, EnqueueError, NameError, RegistryError};
pub use repository::{RoomDirectory, SessionRegistry};
pub use session::{EnqueueOutcome, MalformedStrikes, SessionHandle, SessionState};
pub use value_object::{Identity, MAX_NAME_CHARS, RoomName, SessionId, Timestamp};
