// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! The window owns the tokio runtime that carries the channel, and the
//! lifecycle controller. Every egui update is one display tick.

use crate::capture;
use crate::channel::socket::SocketConnector;
use crate::config::Config;
use crate::session::controller::{Controller, Notice};
use crate::ui::canvas::{self, FrameTexture};
use crate::ui::toolbar::{self, ToolbarAction};
use crate::util::job::Dispatch;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

/// Repaint interval while idle, so channel status stays current.
const IDLE_REPAINT: Duration = Duration::from_millis(100);

pub struct ViewerApp {
    // Declared before the runtime so the channel is closed before the
    // runtime shuts down.
    controller: Controller,
    _runtime: tokio::runtime::Runtime,
    texture: FrameTexture,
    last_notice: Option<String>,
}

impl ViewerApp {
    pub fn new(config: &Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("facecast-net")
            .enable_all()
            .build()
            .context("Failed to start network runtime")?;

        let connector = SocketConnector::new(config.channel.clone(), runtime.handle().clone());
        let controller = Controller::new(
            config,
            capture::from_config(&config.capture),
            Box::new(connector),
            Dispatch::Thread,
        );

        Ok(Self {
            controller,
            _runtime: runtime,
            texture: FrameTexture::default(),
            last_notice: None,
        })
    }

    fn handle_notices(&mut self) {
        for notice in self.controller.take_notices() {
            let text = match notice {
                Notice::Started { device } => format!("Streaming from {}", device),
                Notice::Stopped => "Camera stopped".to_owned(),
                Notice::StartFailed(e) => format!("Camera unavailable: {}", e),
                Notice::ChannelConnected => "Connected to analyzer".to_owned(),
                Notice::ChannelLost(reason) => format!("Connection lost: {}", reason),
                Notice::ChannelFailed(e) => format!("Connection failed: {}", e),
            };
            self.last_notice = Some(text);
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.controller.tick(Instant::now());
        self.handle_notices();

        let action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| {
                toolbar::show(
                    ui,
                    self.controller.is_running(),
                    self.controller.channel_state(),
                    self.controller.frames_sent(),
                    self.last_notice.as_deref(),
                )
            })
            .inner;

        match action {
            ToolbarAction::Start => {
                // Failures surface as a notice on the next frame.
                let _ = self.controller.start();
            }
            ToolbarAction::Stop => self.controller.stop(),
            ToolbarAction::None => {}
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                canvas::show(ui, self.controller.canvas(), &mut self.texture);
            });
        });

        if self.controller.is_running() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(IDLE_REPAINT);
        }
    }
}
