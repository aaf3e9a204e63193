// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration file loading.
//!
//! This module reads configuration in YAML or JSON format, chosen by the
//! file extension.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Import configuration from YAML format.
pub fn import_yaml(path: &Path) -> Result<Config> {
    let yaml = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&yaml)?;
    Ok(config)
}

/// Import configuration from JSON format.
pub fn import_json(path: &Path) -> Result<Config> {
    let json = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&json)?;
    Ok(config)
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|s| s.to_str());
    let config = match extension {
        Some("yaml") | Some("yml") => import_yaml(path),
        Some("json") => import_json(path),
        _ => bail!("Unsupported config file extension: {:?}", extension),
    }
    .with_context(|| format!("Failed to load config from {}", path.display()))?;

    config.validate()?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}
