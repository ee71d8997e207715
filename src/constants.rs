//! Crate-wide constants
//!
//! The audio format and service identity are fixed: both peers must agree
//! on them exactly, and the wire carries no negotiation.

use uuid::{uuid, Uuid};

/// Fixed 128-bit service identifier advertised by the listener and dialed
/// by the connector. Must match exactly between peers.
pub const SERVICE_UUID: Uuid = uuid!("fa87c0d0-afac-11de-8a39-0800200c9a66");

/// Human-readable service name, paired with [`SERVICE_UUID`].
pub const SERVICE_NAME: &str = "P2PWalkieTalkie";

/// Default TCP port for the session rendezvous point.
pub const DEFAULT_SERVICE_PORT: u16 = 45710;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default channel count (mono).
pub const DEFAULT_CHANNELS: u16 = 1;

/// Bytes per sample on the wire (signed 16-bit little-endian PCM).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Default capture frame duration in milliseconds.
pub const DEFAULT_FRAME_MS: u32 = 20;

/// Default timeout for an outbound connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Capacity of the gate -> session worker frame channel.
pub const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Capacity (in chunks) of the playback ring feeding the output device.
pub const PLAYBACK_RING_CHUNKS: usize = 64;

/// Sleep interval while polling a non-blocking accept for cancellation.
pub const ACCEPT_POLL_INTERVAL_MS: u64 = 5;

/// Read-timeout tick during the banner exchange; each tick re-checks the
/// cancel token.
pub const BANNER_POLL_INTERVAL_MS: u64 = 100;

/// Deadline for the whole banner exchange. A connected peer that never
/// sends a banner fails the attempt after this long.
pub const BANNER_EXCHANGE_TIMEOUT_MS: u64 = 5_000;
