//! Asynchronous status notifications
//!
//! The control layer never blocks on the core: every state transition and
//! every error is reported exactly once over a channel. A superseded
//! attempt (cancel-before-replace) reports nothing; its completion is
//! swallowed so no stale notification lands after a newer state.

use crate::error::{AudioError, ConnectError};
use crate::session::state::DisconnectReason;
use crate::transport::PeerHandle;

/// Error carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorEvent {
    /// Listen/connect attempt failed.
    Connect(ConnectError),
    /// An audio endpoint could not be opened.
    Audio(AudioError),
}

impl std::fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "{e}"),
            Self::Audio(e) => write!(f, "{e}"),
        }
    }
}

/// Notification delivered to the control layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A listener role is armed and waiting for an inbound connection.
    Listening,
    /// A connector role is dialing the peer.
    Connecting { peer: PeerHandle },
    /// A session worker is running.
    Connected { peer: Option<PeerHandle> },
    /// The session or attempt ended.
    Disconnected { reason: DisconnectReason },
    /// An attempt failed before a session existed.
    Error(ErrorEvent),
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listening => write!(f, "listening"),
            Self::Connecting { peer } => write!(f, "connecting to {peer}"),
            Self::Connected { peer: Some(peer) } => write!(f, "connected to {peer}"),
            Self::Connected { peer: None } => write!(f, "connected"),
            Self::Disconnected { reason } => write!(f, "disconnected: {reason}"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}
