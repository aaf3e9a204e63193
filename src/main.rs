// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! facecast - live camera viewer for a remote face analyzer
//!
//! Streams rate-limited JPEG frames to a Socket.IO analyzer and shows the
//! processed frames it returns with detection boxes drawn on top.

mod app;
mod capture;
mod channel;
mod config;
mod error;
mod io;
mod models;
mod session;
mod ui;
mod util;

use anyhow::Result;
use app::ViewerApp;
use clap::Parser;
use config::{CaptureBackend, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analyzer base URL, e.g. http://localhost:5000
    #[arg(long)]
    endpoint: Option<String>,

    /// Maximum frames sent per second
    #[arg(long)]
    fps: Option<u32>,

    /// Camera index for the opencv source
    #[arg(long)]
    device: Option<u32>,

    /// Capture source
    #[arg(long, value_enum)]
    source: Option<Source>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Source {
    Pattern,
    Opencv,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.channel.endpoint = endpoint.clone();
        }
        if let Some(fps) = self.fps {
            config.encoder.fps = fps;
        }
        if let Some(device) = self.device {
            config.capture.device_index = device;
        }
        if let Some(source) = self.source {
            config.capture.backend = match source {
                Source::Pattern => CaptureBackend::Pattern,
                Source::Opencv => CaptureBackend::Opencv,
            };
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => io::serialization::load_config(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let app = ViewerApp::new(&config)?;
    let (width, height) = (config.display.width as f32, config.display.height as f32);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width + 32.0, height + 64.0])
            .with_min_inner_size([320.0, 240.0])
            .with_title("facecast"),
        ..Default::default()
    };

    eframe::run_native("facecast", options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
