// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Camera capture sources.
//!
//! A [`CaptureSource`] opens a device and returns a [`DeviceHandle`]. Handles
//! are pull-based: [`DeviceHandle::grab`] returns the latest live frame and
//! never queues. Releasing a handle is idempotent, and dropping one releases
//! it.
//!
//! # Backends
//!
//! | Backend   | Feature        | Notes |
//! |-----------|----------------|-------|
//! | `pattern` | always         | Synthetic moving test pattern |
//! | `opencv`  | `video-opencv` | OpenCV `VideoCapture`, latest-frame reader thread |

use crate::config::{CaptureBackend, CaptureConfig};
use crate::error::DeviceError;
use image::RgbImage;

pub mod pattern;

#[cfg(feature = "video-opencv")]
pub mod opencv;

/// Opens video devices.
pub trait CaptureSource {
    /// Open the device. May prompt for or be denied permission.
    fn acquire(&mut self) -> Result<Box<dyn DeviceHandle>, DeviceError>;
}

/// An open video device.
pub trait DeviceHandle {
    /// Human-readable device name for logs.
    fn label(&self) -> &str;

    /// Latest live frame, or `None` if none is ready yet. Must not block.
    fn grab(&mut self) -> Option<RgbImage>;

    /// Stop all hardware tracks. Safe to call more than once.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Build the capture source selected in the configuration.
pub fn from_config(config: &CaptureConfig) -> Box<dyn CaptureSource> {
    match config.backend {
        CaptureBackend::Pattern => Box::new(pattern::PatternSource::new(config.width, config.height)),
        #[cfg(feature = "video-opencv")]
        CaptureBackend::Opencv => Box::new(opencv::OpencvSource::new(config.device_index)),
        #[cfg(not(feature = "video-opencv"))]
        CaptureBackend::Opencv => Box::new(Unavailable),
    }
}

/// Stand-in for a backend compiled out of this build.
#[cfg(not(feature = "video-opencv"))]
struct Unavailable;

#[cfg(not(feature = "video-opencv"))]
impl CaptureSource for Unavailable {
    fn acquire(&mut self) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        Err(DeviceError::NoDeviceAvailable(
            "built without the video-opencv feature".to_owned(),
        ))
    }
}
