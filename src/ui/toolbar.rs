// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar with the capture toggle and connection status.

use crate::channel::ChannelState;

/// Action requested from the toolbar this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    None,
    Start,
    Stop,
}

/// Display the toolbar.
pub fn show(
    ui: &mut egui::Ui,
    running: bool,
    channel: ChannelState,
    frames_sent: u64,
    notice: Option<&str>,
) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        let label = if running { "■ Stop Camera" } else { "▶ Start Camera" };
        if ui.selectable_label(running, label).clicked() {
            action = if running {
                ToolbarAction::Stop
            } else {
                ToolbarAction::Start
            };
        }

        ui.separator();

        let (text, color) = match channel {
            ChannelState::Connected => ("Connected", egui::Color32::from_rgb(0, 200, 0)),
            ChannelState::Connecting => ("Connecting...", egui::Color32::from_rgb(220, 180, 0)),
            ChannelState::Disconnected => ("Disconnected", egui::Color32::from_gray(160)),
            ChannelState::Failed => ("Connection failed", egui::Color32::from_rgb(220, 50, 50)),
        };
        ui.label(egui::RichText::new(text).color(color));

        if running {
            ui.separator();
            ui.label(format!("{} frames sent", frames_sent));
        }

        if let Some(notice) = notice {
            ui.separator();
            ui.label(egui::RichText::new(notice).italics().weak());
        }
    });

    action
}
