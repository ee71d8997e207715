//! cpal-backed audio engine

use crate::audio::{AudioEngine, CaptureSource, CpalCapture, CpalPlayback, PlaybackSink};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Opens capture/playback endpoints on the default cpal devices.
pub struct CpalEngine {
    config: AudioConfig,
}

impl CpalEngine {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl AudioEngine for CpalEngine {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, AudioError> {
        Ok(Box::new(CpalCapture::open(self.config.clone())?))
    }

    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, AudioError> {
        Ok(Box::new(CpalPlayback::open(self.config.clone())?))
    }
}
