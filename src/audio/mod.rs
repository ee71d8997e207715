//! Audio subsystem
//!
//! Thin adapters around the capture and playback devices, plus the traits
//! the session core talks to. Devices are opened lazily and owned
//! exclusively: capture by the transmission gate, playback by the session
//! worker's receive duty.

pub mod buffer;
pub mod capture;
pub mod engine;
pub mod frame;
pub mod playback;

pub use buffer::{ChunkRing, SharedChunkRing};
pub use capture::CpalCapture;
pub use engine::CpalEngine;
pub use frame::AudioFrame;
pub use playback::CpalPlayback;

use crate::error::AudioError;

/// Microphone endpoint: produces fixed-size PCM frames on demand.
pub trait CaptureSource: Send {
    /// Wait a bounded interval for the next full frame. `Ok(None)` means
    /// no frame arrived within the tick; callers re-check their own stop
    /// condition and call again, so a stalled device can never park them.
    fn capture_frame(&mut self) -> Result<Option<AudioFrame>, AudioError>;
}

/// Speaker endpoint: consumes PCM byte chunks and renders them.
///
/// Chunks need not align with capture frame boundaries; the wire has
/// stream semantics and the playback path accepts whatever arrives.
pub trait PlaybackSink: Send {
    /// Block until the chunk is accepted by the playback device.
    fn play(&mut self, pcm: &[u8]) -> Result<(), AudioError>;
}

/// Factory for audio endpoints. One playback handle is opened per session,
/// one capture handle per gate activation; neither is shared.
pub trait AudioEngine: Send + Sync {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, AudioError>;
    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, AudioError>;
}
