//! Microphone capture endpoint
//!
//! cpal streams are not `Send`, so the stream lives on its own named
//! thread and hands complete frames out over a bounded channel. The device
//! callback converts the f32 samples cpal delivers into the s16le wire
//! format and slices them into fixed-size frames; `capture_frame` waits at
//! most one tick per call, so its caller's stop flag is observed promptly.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::frame::AudioFrame;
use crate::audio::CaptureSource;
use crate::config::AudioConfig;
use crate::constants::FRAME_CHANNEL_CAPACITY;
use crate::error::AudioError;

/// Capture endpoint backed by the default cpal input device.
pub struct CpalCapture {
    running: Arc<AtomicBool>,
    frames_rx: Receiver<AudioFrame>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalCapture {
    /// Open the default input device and start capturing.
    pub fn open(config: AudioConfig) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let (frames_tx, frames_rx) = bounded::<AudioFrame>(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                capture_thread(config, thread_running, frames_tx, ready_tx);
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        // Fail open() fast if the device cannot be acquired.
        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                running,
                frames_rx,
                thread_handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::DeviceUnavailable(
                    "timed out opening capture device".to_string(),
                ))
            }
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl CaptureSource for CpalCapture {
    fn capture_frame(&mut self) -> Result<Option<AudioFrame>, AudioError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::Closed);
        }
        match self.frames_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => Ok(Some(frame)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(AudioError::Closed),
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}

fn capture_thread(
    config: AudioConfig,
    running: Arc<AtomicBool>,
    frames_tx: Sender<AudioFrame>,
    ready_tx: Sender<Result<(), AudioError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(
                "no input device".to_string(),
            )));
            return;
        }
    };

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let frame_len = config.buffer_size();

    // Accumulates converted bytes until a full frame is ready.
    let mut pending: Vec<u8> = Vec::with_capacity(frame_len * 2);
    let callback_running = running.clone();

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if !callback_running.load(Ordering::Relaxed) {
                return;
            }
            for &sample in data {
                let s = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                pending.extend_from_slice(&s.to_le_bytes());
            }
            while pending.len() >= frame_len {
                let rest = pending.split_off(frame_len);
                let frame = AudioFrame::from_slice(&pending);
                pending = rest;
                match frames_tx.try_send(frame) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => return,
                }
            }
        },
        |err| {
            tracing::warn!("capture stream error: {}", err);
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Keep the stream alive while the endpoint is open.
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(10));
    }
}
