// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Latest annotation set received from the analyzer.

use crate::models::annotation::Annotation;
use std::sync::Arc;

/// Last-write-wins holder for the current annotation set.
///
/// Every `set` replaces the whole value; readers get a cheap shared snapshot
/// that later writes never mutate.
pub struct AnnotationStore {
    current: Arc<[Annotation]>,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            current: Arc::from(Vec::new()),
        }
    }

    pub fn set(&mut self, annotations: Vec<Annotation>) {
        self.current = Arc::from(annotations);
    }

    pub fn get(&self) -> Arc<[Annotation]> {
        Arc::clone(&self.current)
    }

    pub fn clear(&mut self) {
        self.set(Vec::new());
    }
}
