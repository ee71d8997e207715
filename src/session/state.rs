//! Session lifecycle state

use crate::transport::PeerHandle;

/// Why a session (or attempt) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Torn down on request: explicit teardown, or superseded by a new
    /// listen/connect attempt.
    Requested,
    /// Read or write failure on the established socket, including the
    /// remote closing the stream.
    SessionIo(String),
    /// The playback device failed mid-session.
    Device(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::SessionIo(msg) => write!(f, "session I/O error: {msg}"),
            Self::Device(msg) => write!(f, "device error: {msg}"),
        }
    }
}

/// The tagged lifecycle state.
///
/// ```text
/// Idle -> Listening | Connecting -> Connected -> Disconnected -> Idle
/// ```
///
/// `Disconnected` is terminal until the next listen/connect/teardown
/// re-arms the machine; there is no automatic reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No socket, no worker.
    Idle,
    /// A listener role is blocked waiting to accept. No timeout; stays
    /// here until an inbound connection arrives or the attempt is
    /// cancelled externally.
    Listening,
    /// A connector role is blocked on an outbound dial.
    Connecting { peer: PeerHandle },
    /// Exactly one session worker is pumping bytes in both directions.
    Connected { peer: Option<PeerHandle> },
    /// The session ended; socket and worker already released.
    Disconnected { reason: DisconnectReason },
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// The remote peer, when one is known in this state.
    pub fn peer(&self) -> Option<&PeerHandle> {
        match self {
            Self::Connecting { peer } => Some(peer),
            Self::Connected { peer } => peer.as_ref(),
            _ => None,
        }
    }
}
