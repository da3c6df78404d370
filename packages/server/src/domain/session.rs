//! Server-side state for one live connection.
//!
//! A [`SessionHandle`] is cheap to clone: the registry, the room fan-out and
//! the connection task all hold the same underlying session. Frames are
//! delivered through a bounded queue drained by the connection's writer.

use std::{fmt, sync::Arc};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};

use super::{
    error::EnqueueError,
    value_object::{Identity, SessionId, Timestamp},
};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, handshake not finished
    Connecting,
    /// Registered; the only state in which it is a routing destination
    Active,
    /// Disconnect detected or shutdown requested; flushing what is queued
    Closing,
    /// Socket released
    Closed,
}

impl SessionState {
    pub fn is_closing(&self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }

    fn accepts_frames(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }
}

/// Result of a successful [`SessionHandle::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The session is closing or closed; the frame was discarded.
    Dropped,
}

struct SessionInner {
    id: SessionId,
    identity: Identity,
    connected_at: Timestamp,
    outbound: mpsc::Sender<String>,
    state: watch::Sender<SessionState>,
}

/// Shared handle to one session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Create a session in the `Connecting` state together with the receiving
    /// end of its outbound queue.
    pub fn new(
        identity: Identity,
        queue_capacity: usize,
        connected_at: Timestamp,
    ) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(queue_capacity.max(1));
        let session = Self {
            inner: Arc::new(SessionInner {
                id: SessionId::generate(),
                identity,
                connected_at,
                outbound,
                state: watch::Sender::new(SessionState::Connecting),
            }),
        };
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn connected_at(&self) -> Timestamp {
        self.inner.connected_at
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Whether both handles refer to the same connection
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// `Connecting -> Active`. Returns `false` from any other state.
    pub fn activate(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Active;
                true
            } else {
                false
            }
        })
    }

    /// `Connecting | Active -> Closing`. Returns `false` if already closing.
    pub fn begin_close(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.accepts_frames() {
                *state = SessionState::Closing;
                true
            } else {
                false
            }
        })
    }

    pub fn mark_closed(&self) {
        self.inner.state.send_replace(SessionState::Closed);
    }

    /// Append an encoded frame to the outbound queue without waiting.
    ///
    /// A full queue means the peer is not keeping up: the session moves to
    /// `Closing` and the frame is refused. Frames for a closing session are
    /// discarded silently.
    pub fn enqueue(&self, frame: String) -> Result<EnqueueOutcome, EnqueueError> {
        if !self.state().accepts_frames() {
            return Ok(EnqueueOutcome::Dropped);
        }
        match self.inner.outbound.try_send(frame) {
            Ok(()) => Ok(EnqueueOutcome::Queued),
            Err(TrySendError::Full(_)) => {
                self.begin_close();
                Err(EnqueueError::CapacityExceeded(self.inner.identity.clone()))
            }
            Err(TrySendError::Closed(_)) => {
                self.begin_close();
                Ok(EnqueueOutcome::Dropped)
            }
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("identity", &self.inner.identity)
            .field("state", &self.state())
            .finish()
    }
}

/// Counter of consecutive malformed frames on one connection
#[derive(Debug, Clone, Copy)]
pub struct MalformedStrikes {
    consecutive: u32,
    limit: u32,
}

impl MalformedStrikes {
    pub fn new(limit: u32) -> Self {
        Self {
            consecutive: 0,
            limit: limit.max(1),
        }
    }

    /// Record a malformed frame. Returns `true` once the limit is reached.
    pub fn record(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.limit
    }

    /// A well-formed frame clears the streak.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
