//! Speaker playback endpoint
//!
//! Mirrors the capture endpoint: the cpal output stream lives on a named
//! thread and drains a shared chunk ring. The output callback converts
//! s16le wire bytes back to f32 device samples, carrying a partial chunk
//! across callback invocations and filling with silence on underrun.

use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer::{create_shared_ring, SharedChunkRing};
use crate::audio::PlaybackSink;
use crate::config::AudioConfig;
use crate::constants::PLAYBACK_RING_CHUNKS;
use crate::error::AudioError;

/// Playback endpoint backed by the default cpal output device.
pub struct CpalPlayback {
    running: Arc<AtomicBool>,
    ring: SharedChunkRing,
    thread_handle: Option<JoinHandle<()>>,
}

impl CpalPlayback {
    /// Open the default output device and start rendering.
    pub fn open(config: AudioConfig) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let ring = create_shared_ring(PLAYBACK_RING_CHUNKS);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_running = running.clone();
        let thread_ring = ring.clone();
        let handle = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                playback_thread(config, thread_running, thread_ring, ready_tx);
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(Self {
                running,
                ring,
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
                    "timed out opening playback device".to_string(),
                ))
            }
        }
    }

    /// Underruns observed by the output callback so far.
    pub fn underruns(&self) -> usize {
        self.ring.underrun_count()
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl PlaybackSink for CpalPlayback {
    fn play(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::Closed);
        }
        self.ring.push(Bytes::copy_from_slice(pcm));
        Ok(())
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        // Releases the device and flushes whatever the ring still holds.
        self.close();
    }
}

fn playback_thread(
    config: AudioConfig,
    running: Arc<AtomicBool>,
    ring: SharedChunkRing,
    ready_tx: Sender<Result<(), AudioError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(AudioError::DeviceUnavailable(
                "no output device".to_string(),
            )));
            return;
        }
    };

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // Partial chunk carried across callbacks.
    let mut current: Bytes = Bytes::new();
    let mut pos = 0usize;
    let callback_running = running.clone();
    let callback_ring = ring.clone();

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if !callback_running.load(Ordering::Relaxed) {
                data.fill(0.0);
                return;
            }
            for sample in data.iter_mut() {
                if pos + 1 >= current.len() {
                    match callback_ring.pop() {
                        Some(chunk) => {
                            current = chunk;
                            pos = 0;
                        }
                        None => {
                            *sample = 0.0;
                            continue;
                        }
                    }
                    if current.len() < 2 {
                        *sample = 0.0;
                        continue;
                    }
                }
                let raw = i16::from_le_bytes([current[pos], current[pos + 1]]);
                *sample = raw as f32 / -(i16::MIN as f32);
                pos += 2;
            }
        },
        |err| {
            tracing::warn!("playback stream error: {}", err);
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

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(10));
    }
}
