//! Push-to-talk transmission gate
//!
//! Outbound audio flows only while the user holds the talk control. The
//! gate owns the capture side: pressing opens a capture source and starts
//! a pump thread that submits every captured frame to the frame sink;
//! releasing stops the pump and drops the source. Whether a session exists
//! is not the gate's concern; the sink drops frames when nothing is
//! connected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{AudioEngine, CaptureSource};
use crate::error::AudioError;
use crate::session::FrameSink;

/// Gate between the capture device and the session. One per application;
/// survives sessions coming and going.
pub struct TransmissionGate {
    engine: Arc<dyn AudioEngine>,
    sink: Arc<FrameSink>,
    active: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl TransmissionGate {
    pub fn new(engine: Arc<dyn AudioEngine>, sink: Arc<FrameSink>) -> Self {
        Self {
            engine,
            sink,
            active: Arc::new(AtomicBool::new(false)),
            pump: None,
        }
    }

    /// Whether the talk control is currently held.
    pub fn is_transmitting(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Press: open capture and start submitting frames. Idempotent while
    /// already pressed. A capture device failure surfaces here, before any
    /// frame flows.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Reap a pump that exited on its own (device failure).
        if let Some(old) = self.pump.take() {
            let _ = old.join();
        }

        let capture = match self.engine.open_capture() {
            Ok(capture) => capture,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let active = self.active.clone();
        let sink = self.sink.clone();
        let pump = thread::Builder::new()
            .name("capture-gate".to_string())
            .spawn(move || capture_pump(capture, sink, active))
            .map_err(|e| {
                self.active.store(false, Ordering::SeqCst);
                AudioError::Stream(e.to_string())
            })?;

        self.pump = Some(pump);
        tracing::debug!("transmission started");
        Ok(())
    }

    /// Release: stop submitting and drop the capture source. Idempotent,
    /// and bounded: the pump re-checks the flag every capture tick, so the
    /// join returns promptly even when the device delivers nothing.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
            tracing::debug!("transmission stopped");
        }
    }
}

impl Drop for TransmissionGate {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_pump(mut capture: Box<dyn CaptureSource>, sink: Arc<FrameSink>, active: Arc<AtomicBool>) {
    while active.load(Ordering::SeqCst) {
        match capture.capture_frame() {
            Ok(Some(frame)) => {
                sink.submit(frame);
            }
            // No frame this tick; loop around and re-check the flag.
            Ok(None) => {}
            Err(AudioError::Closed) => break,
            Err(e) => {
                tracing::warn!("capture failed: {}", e);
                break;
            }
        }
    }
    // The pump owns the truth about transmission: once it exits (stopped
    // or failed), the gate reads as not transmitting.
    active.store(false, Ordering::SeqCst);
}
