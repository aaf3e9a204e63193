// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Frame data structures.
//!
//! Outbound frames are transient encoded payloads. Inbound processed frames
//! only become displayable once they are fully decoded into a
//! [`DisplayFrame`].

use image::RgbaImage;
use std::time::Instant;

/// An encoded camera sample ready to be sent to the analyzer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// `data:image/jpeg;base64,...` payload.
    pub payload: String,
    pub captured_at: Instant,
}

/// A fully decoded processed frame.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    /// Arrival order of the `camera-frame` message this was decoded from.
    pub seq: u64,
    pub image: RgbaImage,
}

impl DisplayFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
