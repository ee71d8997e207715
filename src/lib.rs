//! Peer-to-peer push-to-talk voice link.
//!
//! Two devices discover each other out of band, establish exactly one
//! bidirectional byte-stream session, and relay live microphone audio to
//! the other side's speaker while a hold-to-talk gate controls who may
//! transmit. The crate is organized around three concurrent roles:
//!
//! - a passive listener or active connector producing the session socket,
//! - a session worker pumping bytes between the socket and the local
//!   audio endpoints,
//! - a transmission gate streaming capture frames into the worker while
//!   the talk control is held.
//!
//! [`session::SessionManager`] orchestrates the roles and guarantees that
//! at most one session is ever alive; [`gate::TransmissionGate`] runs
//! independently of the session lifetime. The wire format is unframed raw
//! little-endian 16-bit mono PCM; see [`transport`] for the caveats that
//! come with stream (not datagram) semantics.

pub mod audio;
pub mod config;
pub mod constants;
pub mod error;
pub mod gate;
pub mod session;
pub mod transport;

pub use error::{AudioError, ConnectError, Error, Result};
pub use gate::TransmissionGate;
pub use session::{DisconnectReason, SessionEvent, SessionManager, SessionState};
pub use transport::PeerHandle;
