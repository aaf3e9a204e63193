// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data models for frames and annotations.

pub mod annotation;
pub mod frame;
