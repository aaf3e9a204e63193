// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

pub mod controller;
pub mod encoder;
pub mod render;
pub mod store;
