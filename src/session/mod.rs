//! Session core
//!
//! The connection lifecycle state machine, the worker that pumps bytes
//! between the session socket and the audio endpoints, and the manager
//! that guarantees at most one of each is ever alive.

pub mod events;
pub mod manager;
pub mod sink;
pub mod state;
pub mod worker;

pub use events::{ErrorEvent, SessionEvent};
pub use manager::SessionManager;
pub use sink::FrameSink;
pub use state::{DisconnectReason, SessionState};
pub use worker::SessionWorker;
