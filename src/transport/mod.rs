//! Session transport
//!
//! The core treats the underlying radio as an interchangeable provider of
//! duplex byte streams: a [`Transport`] produces a [`SessionSocket`] either
//! by waiting for an inbound connection (listener role) or by dialing a
//! chosen [`PeerHandle`] (connector role). Exactly one socket exists per
//! session and it is owned exclusively by the session worker.
//!
//! The audio payload is an unframed raw PCM stream: writes are chunked at
//! most one capture frame, but the reader forwards whatever byte count each
//! read returns. Read boundaries are not write boundaries, and a receiver
//! that joins mid-stream may be misaligned relative to sample boundaries.
//! This matches the source behavior and is a known limitation; framing the
//! stream would change the wire format.

pub mod handshake;
pub mod tcp;

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ConnectError;

pub use handshake::ServiceBanner;
pub use tcp::TcpTransport;

/// Opaque identity of a discoverable remote device.
///
/// Created by the discovery collaborator (or parsed from user input),
/// consumed by the connector role, discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandle {
    /// Transport address of the peer's rendezvous point
    pub address: SocketAddr,
    /// Display name
    pub name: String,
}

impl std::fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Bidirectional, session-oriented byte stream to one connected peer.
///
/// Reads and writes block. `shutdown` must reliably unblock a read that is
/// outstanding on another thread; it is safe to call more than once.
pub trait SessionSocket: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Clone a second handle to the same underlying stream, so the receive
    /// and send duties can run on separate threads.
    fn try_clone(&self) -> io::Result<Box<dyn SessionSocket>>;

    /// Close both directions. Idempotent.
    fn shutdown(&self) -> io::Result<()>;

    /// The remote peer, once known.
    fn peer(&self) -> Option<PeerHandle>;
}

/// Cooperative cancellation flag shared with a blocked listener/connector.
///
/// Checked at every blocking-call boundary; cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Duplex byte-stream provider: the listener and connector roles.
///
/// Both calls block until a socket is established, the attempt fails, or
/// the token is cancelled. Implementations must return
/// [`ConnectError::Cancelled`] rather than hang once the token trips.
pub trait Transport: Send + Sync {
    /// Open a passive rendezvous point and accept exactly one inbound
    /// connection, then close the rendezvous point.
    fn listen(&self, cancel: &CancelToken) -> Result<Box<dyn SessionSocket>, ConnectError>;

    /// Dial the peer's rendezvous point.
    fn connect(
        &self,
        peer: &PeerHandle,
        cancel: &CancelToken,
    ) -> Result<Box<dyn SessionSocket>, ConnectError>;
}

/// Hook into the (external) discovery collaborator.
///
/// Discovery and active connection attempts are mutually exclusive on
/// shared radio hardware, so the session manager cancels any ongoing scan
/// before dialing out.
pub trait DiscoveryControl: Send + Sync {
    fn cancel_discovery(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_idempotent() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());

        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_peer_handle_display() {
        let peer = PeerHandle {
            address: "192.168.1.20:45710".parse().unwrap(),
            name: "Kitchen".to_string(),
        };
        assert_eq!(peer.to_string(), "Kitchen (192.168.1.20:45710)");
    }
}
