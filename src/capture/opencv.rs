// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! OpenCV camera capture.
//!
//! `VideoCapture::read` blocks until the next frame, so a reader thread owns
//! the device and publishes frames through a capacity-1 channel. Frames that
//! arrive while the slot is full are dropped; the handle only ever sees the
//! most recent one.

use super::{CaptureSource, DeviceHandle};
use crate::error::DeviceError;
use crate::util::job::join_within;
use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Longest `release` waits for a blocked `read` to return.
const RELEASE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct OpencvSource {
    device_index: u32,
}

impl OpencvSource {
    pub fn new(device_index: u32) -> Self {
        Self { device_index }
    }
}

impl CaptureSource for OpencvSource {
    fn acquire(&mut self) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        let index = self.device_index as i32;
        let mut capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        let opened = capture
            .is_opened()
            .map_err(|e| DeviceError::Backend(e.to_string()))?;
        if !opened {
            return Err(DeviceError::NoDeviceAvailable(format!("camera index {index}")));
        }

        // A device that opens but refuses to deliver is almost always an OS
        // privacy block.
        let mut probe = Mat::default();
        let delivered = capture.read(&mut probe).unwrap_or(false);
        if !delivered || probe.empty() {
            let _ = capture.release();
            return Err(DeviceError::PermissionDenied(format!(
                "camera index {index} opened but delivered no frames"
            )));
        }

        let label = format!("opencv camera {index}");
        log::info!("Opened {} ({}x{})", label, probe.cols(), probe.rows());

        let running = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = sync_channel::<RgbImage>(1);
        let flag = Arc::clone(&running);
        let reader = std::thread::spawn(move || {
            let mut mat = Mat::default();
            while flag.load(Ordering::Relaxed) {
                match capture.read(&mut mat) {
                    Ok(true) if !mat.empty() => {
                        if let Some(image) = mat_to_rgb(&mat) {
                            // Full slot: drop this frame.
                            let _ = sender.try_send(image);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("Camera read failed: {}", e);
                        break;
                    }
                }
            }
            if let Err(e) = capture.release() {
                log::warn!("Camera release failed: {}", e);
            }
        });

        Ok(Box::new(OpencvHandle {
            label,
            running,
            receiver,
            reader: Some(reader),
        }))
    }
}

fn mat_to_rgb(bgr: &Mat) -> Option<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).ok()?;
    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let bytes = rgb.data_bytes().ok()?.to_vec();
    RgbImage::from_raw(width, height, bytes)
}

struct OpencvHandle {
    label: String,
    running: Arc<AtomicBool>,
    receiver: Receiver<RgbImage>,
    reader: Option<JoinHandle<()>>,
}

impl DeviceHandle for OpencvHandle {
    fn label(&self) -> &str {
        &self.label
    }

    fn grab(&mut self) -> Option<RgbImage> {
        let mut latest = None;
        while let Ok(image) = self.receiver.try_recv() {
            latest = Some(image);
        }
        latest
    }

    fn release(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        self.running.store(false, Ordering::Relaxed);
        if join_within(reader, RELEASE_TIMEOUT) {
            log::info!("Released {}", self.label);
        } else {
            // The reader closes the device itself once its read returns.
            log::warn!("{} is still reading; releasing in the background", self.label);
        }
    }

    fn is_released(&self) -> bool {
        self.reader.is_none()
    }
}

impl Drop for OpencvHandle {
    fn drop(&mut self) {
        self.release();
    }
}
