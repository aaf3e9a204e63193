// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for capture, transport and image coding.

use thiserror::Error;

/// Failure to open or read the capture device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    // Only camera backends raise these; the test pattern never fails.
    #[cfg_attr(not(feature = "video-opencv"), allow(dead_code))]
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("no camera device available: {0}")]
    NoDeviceAvailable(String),

    #[cfg_attr(not(feature = "video-opencv"), allow(dead_code))]
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// Terminal failure of a channel session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server rejected connection: {0}")]
    Rejected(String),

    #[error("gave up after {attempts} connection attempts: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: String },
}

/// Malformed inbound image payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid image data: {0}")]
    Image(#[from] image::ImageError),
}

/// Failure to turn a captured frame into a transportable payload.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("jpeg encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("encoded payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Malformed Engine.IO / Socket.IO packet.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,

    #[error("unknown {layer} packet type {kind:?}")]
    UnknownType { layer: &'static str, kind: char },

    #[error("unsupported packet: {0}")]
    Unsupported(&'static str),

    #[error("malformed packet payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed event: {0}")]
    Event(&'static str),
}
