//! Gate-to-worker frame hand-off
//!
//! The transmission gate outlives any single session, so it never holds a
//! worker directly. It submits frames through this sink; the session
//! manager installs the live worker's send channel on connect and clears
//! it on teardown. With no session installed, frames are dropped, never
//! queued for a future session.

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audio::AudioFrame;

/// Best-effort submission point for captured frames.
#[derive(Default)]
pub struct FrameSink {
    current: RwLock<Option<Sender<AudioFrame>>>,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a frame to the current session, if any. Returns whether the
    /// frame was accepted; a frame racing session teardown may be dropped,
    /// which is acceptable; audio has no delivery guarantee.
    pub fn submit(&self, frame: AudioFrame) -> bool {
        let accepted = match &*self.current.read() {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        };
        if accepted {
            self.submitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Install the live worker's send channel.
    pub(crate) fn install(&self, tx: Sender<AudioFrame>) {
        *self.current.write() = Some(tx);
    }

    /// Detach from the (now dead) worker.
    pub(crate) fn clear(&self) {
        *self.current.write() = None;
    }

    pub fn frames_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
