// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration.
//!
//! Every field has a default matching the stock analyzer setup
//! (`localhost:5000`, 20 fps, 320x240 encode, 640x480 display), so an empty
//! config file is valid.

use crate::io::media::EncodeParams;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub capture: CaptureConfig,
    pub encoder: EncoderConfig,
    pub display: DisplayConfig,
}

/// Socket.IO connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Base URL of the analyzer, e.g. `http://localhost:5000`.
    pub endpoint: String,
    /// Retries after the first failed attempt before giving up.
    pub reconnection_attempts: u32,
    pub reconnection_delay_ms: u64,
    pub reconnection_delay_max_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Synthetic moving test pattern.
    Pattern,
    /// OpenCV `VideoCapture` (requires the `video-opencv` feature).
    Opencv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub backend: CaptureBackend,
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Upper bound on outbound frames per second.
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Map annotation coordinates from processed-frame to display resolution.
    pub scale_annotations: bool,
    pub line_width: f32,
    /// RGBA stroke for recognized detections.
    pub recognized_color: [u8; 4],
    /// RGBA stroke for unrecognized detections.
    pub unrecognized_color: [u8; 4],
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_owned(),
            reconnection_attempts: 3,
            reconnection_delay_ms: 1000,
            reconnection_delay_max_ms: 5000,
            connect_timeout_ms: 20_000,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::Pattern,
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            fps: 20,
            width: 320,
            height: 240,
            quality: 50,
            max_payload_bytes: 1_000_000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            scale_annotations: false,
            line_width: 2.0,
            recognized_color: [0, 255, 0, 255],
            unrecognized_color: [0, 0, 0, 0],
        }
    }
}

impl ChannelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Delay before the given retry (1-based), doubling up to the maximum.
    pub fn reconnection_delay(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        let ms = self
            .reconnection_delay_ms
            .saturating_mul(factor)
            .min(self.reconnection_delay_max_ms);
        Duration::from_millis(ms)
    }
}

impl EncoderConfig {
    /// Minimum spacing between two samples.
    pub fn min_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.fps.max(1)))
    }

    pub fn params(&self) -> EncodeParams {
        EncodeParams {
            width: self.width,
            height: self.height,
            quality: self.quality,
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

impl Config {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.encoder.fps == 0 {
            bail!("encoder.fps must be at least 1");
        }
        if !(1..=100).contains(&self.encoder.quality) {
            bail!("encoder.quality must be within 1..=100, got {}", self.encoder.quality);
        }
        for (name, w, h) in [
            ("encoder", self.encoder.width, self.encoder.height),
            ("display", self.display.width, self.display.height),
            ("capture", self.capture.width, self.capture.height),
        ] {
            if w == 0 || h == 0 {
                bail!("{name} resolution must be non-zero, got {w}x{h}");
            }
        }
        if self.channel.endpoint.trim().is_empty() {
            bail!("channel.endpoint must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.encoder.min_interval(), Duration::from_millis(50));
        assert_eq!(config.display.recognized_color, [0, 255, 0, 255]);
    }

    #[test]
    fn test_validation_rejects_zero_fps_and_bad_quality() {
        let mut config = Config::default();
        config.encoder.fps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.encoder.quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.display.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnection_delay_is_capped() {
        let channel = ChannelConfig::default();
        assert_eq!(channel.reconnection_delay(1), Duration::from_millis(1000));
        assert_eq!(channel.reconnection_delay(2), Duration::from_millis(2000));
        assert_eq!(channel.reconnection_delay(3), Duration::from_millis(4000));
        assert_eq!(channel.reconnection_delay(4), Duration::from_millis(5000));
        assert_eq!(channel.reconnection_delay(40), Duration::from_millis(5000));
    }
}
