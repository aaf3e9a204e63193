// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides coordinate transformations between the processed
//! frame's pixel space and the display canvas.

use crate::models::annotation::Annotation;

/// An axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            x1: annotation.x1,
            y1: annotation.y1,
            x2: annotation.x2,
            y2: annotation.y2,
        }
    }
}

/// Scale a rectangle from a `from` resolution to a `to` resolution.
pub fn scale_rect(rect: Rect, from: (u32, u32), to: (u32, u32)) -> Rect {
    if from.0 == 0 || from.1 == 0 {
        return rect;
    }
    let sx = to.0 as f32 / from.0 as f32;
    let sy = to.1 as f32 / from.1 as f32;
    Rect {
        x1: rect.x1 * sx,
        y1: rect.y1 * sy,
        x2: rect.x2 * sx,
        y2: rect.y2 * sy,
    }
}
