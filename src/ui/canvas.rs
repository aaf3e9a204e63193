// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Presentation surface for the processed frame and its detection boxes.
//!
//! [`Canvas`] is a retained display list in canvas pixels, owned by the
//! lifecycle controller. [`show`] paints it into egui every frame, stretching
//! the processed frame over the whole canvas and drawing boxes on top.

use crate::models::frame::DisplayFrame;
use crate::util::geometry::Rect;
use std::sync::Arc;

/// Outline style for a rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    /// Unmultiplied RGBA.
    pub color: [u8; 4],
}

impl Stroke {
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.color[3] > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub rect: Rect,
    pub stroke: Stroke,
}

pub struct Canvas {
    width: u32,
    height: u32,
    image: Option<Arc<DisplayFrame>>,
    shapes: Vec<Shape>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            image: None,
            shapes: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.image = None;
        self.shapes.clear();
    }

    /// Draw a frame scaled to cover the whole canvas.
    pub fn draw_image(&mut self, frame: Arc<DisplayFrame>) {
        self.image = Some(frame);
    }

    pub fn stroke_rect(&mut self, rect: Rect, stroke: Stroke) {
        self.shapes.push(Shape { rect, stroke });
    }

    pub fn image(&self) -> Option<&Arc<DisplayFrame>> {
        self.image.as_ref()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_blank(&self) -> bool {
        self.image.is_none() && self.shapes.is_empty()
    }
}

/// GPU texture for the frame currently on the canvas.
#[derive(Default)]
pub struct FrameTexture {
    handle: Option<egui::TextureHandle>,
    seq: Option<u64>,
}

impl FrameTexture {
    fn update(&mut self, ctx: &egui::Context, frame: &DisplayFrame) -> egui::TextureId {
        let size = [frame.width() as usize, frame.height() as usize];
        if self.seq != Some(frame.seq) || self.handle.is_none() {
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, frame.image.as_raw());
            match self.handle.as_mut() {
                Some(handle) => handle.set(color_image, egui::TextureOptions::LINEAR),
                None => {
                    self.handle = Some(ctx.load_texture(
                        "processed_frame",
                        color_image,
                        egui::TextureOptions::LINEAR,
                    ));
                }
            }
            self.seq = Some(frame.seq);
        }
        match &self.handle {
            Some(handle) => handle.id(),
            None => egui::TextureId::default(),
        }
    }
}

/// Paint the canvas at its logical size.
pub fn show(ui: &mut egui::Ui, canvas: &Canvas, texture: &mut FrameTexture) {
    let (width, height) = canvas.size();
    let (canvas_rect, _response) =
        ui.allocate_exact_size(egui::vec2(width as f32, height as f32), egui::Sense::hover());
    let painter = ui.painter_at(canvas_rect);

    painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));
    painter.rect_stroke(canvas_rect, 0.0, egui::Stroke::new(1.0, egui::Color32::from_gray(51)));

    if canvas.is_blank() {
        painter.text(
            canvas_rect.center(),
            egui::Align2::CENTER_CENTER,
            "No video",
            egui::FontId::proportional(16.0),
            egui::Color32::from_gray(120),
        );
        return;
    }

    if let Some(frame) = canvas.image() {
        let id = texture.update(ui.ctx(), frame);
        painter.image(
            id,
            canvas_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    for shape in canvas.shapes() {
        if !shape.stroke.is_visible() {
            continue;
        }
        let [r, g, b, a] = shape.stroke.color;
        let rect = egui::Rect::from_min_max(
            canvas_rect.min + egui::vec2(shape.rect.x1, shape.rect.y1),
            canvas_rect.min + egui::vec2(shape.rect.x2, shape.rect.y2),
        );
        painter.rect_stroke(
            rect,
            0.0,
            egui::Stroke::new(shape.stroke.width, egui::Color32::from_rgba_unmultiplied(r, g, b, a)),
        );
    }
}
