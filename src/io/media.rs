// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image payload encoding and decoding.
//!
//! Outbound samples are resized, JPEG-compressed and wrapped in a base64
//! data URI. Inbound processed frames arrive in the same form and are decoded
//! to RGBA pixels suitable for display in egui.

use crate::error::{DecodeError, EncodeError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{RgbImage, RgbaImage};

const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Output format for encoded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    pub max_payload_bytes: usize,
}

/// Resize and JPEG-compress a captured image into a data URI.
pub fn encode_data_uri(image: &RgbImage, params: &EncodeParams) -> Result<String, EncodeError> {
    let resized;
    let source = if image.dimensions() == (params.width, params.height) {
        image
    } else {
        resized = image::imageops::resize(image, params.width, params.height, FilterType::Triangle);
        &resized
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, params.quality).encode_image(source)?;

    let mut payload = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    payload.push_str(JPEG_DATA_URI_PREFIX);
    STANDARD.encode_string(&jpeg, &mut payload);

    if payload.len() > params.max_payload_bytes {
        return Err(EncodeError::PayloadTooLarge {
            size: payload.len(),
            limit: params.max_payload_bytes,
        });
    }
    Ok(payload)
}

/// Decode a data URI (or bare base64 string) into RGBA pixels.
pub fn decode_data_uri(payload: &str) -> Result<RgbaImage, DecodeError> {
    // Anything up to the first comma is the media type header.
    let data = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    let bytes = STANDARD.decode(data.trim())?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgba8())
}
