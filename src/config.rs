//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::*;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name shown to the remote peer
    pub display_name: String,

    /// Transport configuration
    pub transport: TransportConfig,

    /// Audio configuration
    pub audio: AudioConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display_name: format!("Peer-{}", std::process::id()),
            transport: TransportConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Local bind address for the rendezvous point
    pub bind_address: String,

    /// TCP port for the rendezvous point
    pub port: u16,

    /// Outbound connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Enable SO_REUSEADDR on the rendezvous socket
    pub reuse_addr: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_SERVICE_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reuse_addr: true,
        }
    }
}

/// Audio configuration
///
/// Fixes the wire format: both peers must use the same sample rate and
/// channel count, there is no in-band negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u16,

    /// Capture frame duration in milliseconds
    pub frame_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frame_ms: DEFAULT_FRAME_MS,
        }
    }
}

impl AudioConfig {
    /// Samples per capture frame (per channel).
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize) / 1000
    }

    /// Size of one capture frame in bytes. This is the unit exchanged
    /// between the audio endpoints and the wire, derived once at startup.
    pub fn buffer_size(&self) -> usize {
        self.frame_samples() * self.channels as usize * BYTES_PER_SAMPLE
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &PathBuf) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "p2p-walkie", "walkie")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
