// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Synthetic capture source.
//!
//! Produces a gradient with a bright square that moves one step per grab,
//! so the round trip through the analyzer is visible without a camera.

use super::{CaptureSource, DeviceHandle};
use crate::error::DeviceError;
use image::{Rgb, RgbImage};

pub struct PatternSource {
    width: u32,
    height: u32,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl CaptureSource for PatternSource {
    fn acquire(&mut self) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        log::info!("Opened test pattern {}x{}", self.width, self.height);
        Ok(Box::new(PatternHandle {
            width: self.width,
            height: self.height,
            tick: 0,
            released: false,
        }))
    }
}

struct PatternHandle {
    width: u32,
    height: u32,
    tick: u32,
    released: bool,
}

impl DeviceHandle for PatternHandle {
    fn label(&self) -> &str {
        "test pattern"
    }

    fn grab(&mut self) -> Option<RgbImage> {
        if self.released {
            return None;
        }
        self.tick = self.tick.wrapping_add(1);

        let side = (self.width.min(self.height) / 4).max(1);
        let span = self.width.saturating_sub(side).max(1);
        let left = self.tick.wrapping_mul(4) % span;
        let top = (self.height.saturating_sub(side)) / 2;

        Some(RgbImage::from_fn(self.width, self.height, |x, y| {
            if (left..left + side).contains(&x) && (top..top + side).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([
                    (x * 255 / self.width.max(1)) as u8,
                    (y * 255 / self.height.max(1)) as u8,
                    96,
                ])
            }
        }))
    }

    fn release(&mut self) {
        if !self.released {
            log::info!("Test pattern stopped");
            self.released = true;
        }
    }

    fn is_released(&self) -> bool {
        self.released
    }
}
