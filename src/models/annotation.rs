// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! This module defines the detection boxes received from the analyzer and
//! their wire representation, `[x1, y1, x2, y2, recognized]`. Entries may
//! omit the flag or carry extra trailing fields.

use serde::de::{Error as _, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An axis-aligned detection box in processed-frame pixel coordinates.
///
/// The corners are always ordered: `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub recognized: bool,
}

impl Annotation {
    /// Create an annotation from two opposite corners, in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, recognized: bool) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            recognized,
        }
    }
}

/// Recognition flag as sent by the analyzer: either a JSON bool or a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Number(f64),
}

impl From<WireFlag> for bool {
    fn from(flag: WireFlag) -> Self {
        match flag {
            WireFlag::Bool(b) => b,
            WireFlag::Number(n) => n != 0.0,
        }
    }
}

impl Serialize for Annotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.x1, self.y1, self.x2, self.y2, self.recognized).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Annotation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(AnnotationVisitor)
    }
}

/// Reads `[x1, y1, x2, y2, flag?, ...]`. A missing or null flag means
/// unrecognized; trailing elements are extra classification data and are
/// skipped.
struct AnnotationVisitor;

impl<'de> Visitor<'de> for AnnotationVisitor {
    type Value = Annotation;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array [x1, y1, x2, y2, recognized?]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Annotation, A::Error> {
        let mut coords = [0f32; 4];
        for (i, coord) in coords.iter_mut().enumerate() {
            *coord = seq
                .next_element()?
                .ok_or_else(|| A::Error::invalid_length(i, &self))?;
        }
        if !coords.iter().all(|v| v.is_finite()) {
            return Err(A::Error::custom("annotation coordinates must be finite"));
        }

        let flag: Option<Option<WireFlag>> = seq.next_element()?;
        let recognized = flag.flatten().map_or(false, bool::from);
        while seq.next_element::<IgnoredAny>()?.is_some() {}

        let [x1, y1, x2, y2] = coords;
        Ok(Annotation::new(x1, y1, x2, y2, recognized))
    }
}

/// Parse a `faces` payload into an ordered annotation set.
pub fn parse_annotation_set(value: serde_json::Value) -> Result<Vec<Annotation>, serde_json::Error> {
    serde_json::from_value(value)
}
