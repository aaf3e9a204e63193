// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! UI components for the viewer window.

pub mod canvas;
pub mod toolbar;
