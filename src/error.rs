//! Error types
//!
//! Connection-setup and audio-device failures are separate enums so the
//! listener/connector roles and the audio endpoints each surface only the
//! failures they can actually produce. The top-level [`Error`] is what the
//! configuration layer and the binary work with.

use thiserror::Error;

/// Failure while establishing a session (listen or connect).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The platform refused the capability (e.g. binding a privileged
    /// port). Surfaced immediately, never retried.
    #[error("permission denied by the platform")]
    PermissionDenied,

    /// The radio/transport is disabled or unreachable.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Handshake or accept failure. Surfaced to the caller, not retried.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The attempt was cancelled from another thread.
    #[error("attempt cancelled")]
    Cancelled,
}

/// Failure on a capture or playback endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The device could not be opened.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device stream failed after opening.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// The endpoint was closed while a blocking call was outstanding.
    #[error("audio endpoint closed")]
    Closed,
}

/// Top-level crate error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;
