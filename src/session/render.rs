// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Processed-frame decoding and overlay rendering.
//!
//! Inbound `camera-frame` payloads are decoded off the UI thread, one at a
//! time. While a decode is running only the newest waiting payload is kept.
//! A finished decode replaces the displayed frame in one step; a failed one
//! leaves the previous frame on screen.

use crate::config::DisplayConfig;
use crate::error::DecodeError;
use crate::io::media::decode_data_uri;
use crate::models::annotation::Annotation;
use crate::models::frame::DisplayFrame;
use crate::ui::canvas::{Canvas, Stroke};
use crate::util::geometry::{scale_rect, Rect};
use crate::util::job::{Dispatch, JobSlot};
use image::RgbaImage;
use std::sync::Arc;

/// Box styles for recognized and unrecognized detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub recognized: Stroke,
    pub unrecognized: Stroke,
}

impl OverlayStyle {
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            recognized: Stroke {
                width: config.line_width,
                color: config.recognized_color,
            },
            unrecognized: Stroke {
                width: config.line_width,
                color: config.unrecognized_color,
            },
        }
    }

    fn for_annotation(&self, annotation: &Annotation) -> Stroke {
        if annotation.recognized {
            self.recognized
        } else {
            self.unrecognized
        }
    }
}

type DecodeResult = (u64, Result<RgbaImage, DecodeError>);

pub struct Renderer {
    style: OverlayStyle,
    scale_annotations: bool,
    decode: JobSlot<DecodeResult>,
    /// Newest payload waiting for the decoder.
    pending: Option<(u64, String)>,
    shown: Option<Arc<DisplayFrame>>,
    next_seq: u64,
}

impl Renderer {
    pub fn new(config: &DisplayConfig, dispatch: Dispatch) -> Self {
        Self {
            style: OverlayStyle::from_config(config),
            scale_annotations: config.scale_annotations,
            decode: JobSlot::new(dispatch),
            pending: None,
            shown: None,
            next_seq: 0,
        }
    }

    /// Accept a processed-frame payload for display.
    pub fn submit(&mut self, payload: String) {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.decode.is_busy() {
            if let Some((dropped, _)) = self.pending.replace((seq, payload)) {
                log::trace!("Superseded processed frame {} before decode", dropped);
            }
        } else {
            self.start_decode(seq, payload);
        }
    }

    /// Collect a finished decode, if any, and start the next one.
    pub fn poll(&mut self) {
        let Some((seq, result)) = self.decode.poll() else {
            return;
        };

        match result {
            Ok(image) => {
                let newer = self.shown.as_ref().map_or(true, |shown| seq > shown.seq);
                if newer {
                    self.shown = Some(Arc::new(DisplayFrame { seq, image }));
                }
            }
            Err(e) => log::warn!("Dropping processed frame {}: {}", seq, e),
        }

        if let Some((seq, payload)) = self.pending.take() {
            self.start_decode(seq, payload);
        }
    }

    #[cfg(test)]
    pub fn shown(&self) -> Option<&Arc<DisplayFrame>> {
        self.shown.as_ref()
    }

    /// Redraw the canvas. Returns `false` and leaves the canvas untouched if
    /// no frame has been decoded yet.
    pub fn draw(&self, canvas: &mut Canvas, annotations: &[Annotation]) -> bool {
        let Some(frame) = &self.shown else {
            return false;
        };

        canvas.clear();
        canvas.draw_image(Arc::clone(frame));

        let frame_size = (frame.width(), frame.height());
        let canvas_size = canvas.size();
        for annotation in annotations {
            let mut rect = Rect::from_annotation(annotation);
            if self.scale_annotations {
                rect = scale_rect(rect, frame_size, canvas_size);
            }
            canvas.stroke_rect(rect, self.style.for_annotation(annotation));
        }
        true
    }

    /// Forget everything: displayed frame, waiting payload and any decode in
    /// flight.
    pub fn reset(&mut self) {
        self.decode.cancel();
        self.pending = None;
        self.shown = None;
    }

    fn start_decode(&mut self, seq: u64, payload: String) {
        self.decode.submit(move || (seq, decode_data_uri(&payload)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::{encode_data_uri, EncodeParams};
    use image::{Rgb, RgbImage};

    fn payload(width: u32, height: u32, shade: u8) -> String {
        let image = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let params = EncodeParams {
            width,
            height,
            quality: 90,
            max_payload_bytes: usize::MAX,
        };
        encode_data_uri(&image, &params).unwrap()
    }

    fn renderer(config: &DisplayConfig) -> Renderer {
        Renderer::new(config, Dispatch::Inline)
    }

    #[test]
    fn test_nothing_drawn_before_first_frame() {
        let renderer = renderer(&DisplayConfig::default());
        let mut canvas = Canvas::new(640, 480);
        let faces = [Annotation::new(0.0, 0.0, 10.0, 10.0, true)];
        assert!(!renderer.draw(&mut canvas, &faces));
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_frame_without_annotations_draws_no_overlay() {
        let mut renderer = renderer(&DisplayConfig::default());
        renderer.submit(payload(320, 240, 200));
        renderer.poll();

        let mut canvas = Canvas::new(640, 480);
        assert!(renderer.draw(&mut canvas, &[]));
        assert_eq!(canvas.image().unwrap().width(), 320);
        assert!(canvas.shapes().is_empty());
    }

    #[test]
    fn test_styles_follow_recognition() {
        let mut renderer = renderer(&DisplayConfig::default());
        renderer.submit(payload(320, 240, 10));
        renderer.poll();

        let mut canvas = Canvas::new(640, 480);
        let faces = [
            Annotation::new(0.0, 0.0, 100.0, 100.0, true),
            Annotation::new(10.0, 10.0, 20.0, 20.0, false),
        ];
        renderer.draw(&mut canvas, &faces);

        let shapes = canvas.shapes();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].stroke, Stroke { width: 2.0, color: [0, 255, 0, 255] });
        assert_eq!(shapes[0].rect, Rect { x1: 0.0, y1: 0.0, x2: 100.0, y2: 100.0 });
        assert!(!shapes[1].stroke.is_visible());
    }

    #[test]
    fn test_decode_error_keeps_previous_frame() {
        let mut renderer = renderer(&DisplayConfig::default());
        renderer.submit(payload(320, 240, 10));
        renderer.poll();
        let first = renderer.shown().unwrap().seq;

        renderer.submit("data:image/jpeg;base64,not-an-image".to_owned());
        renderer.poll();
        assert_eq!(renderer.shown().unwrap().seq, first);

        renderer.submit(payload(160, 120, 10));
        renderer.poll();
        assert_eq!(renderer.shown().unwrap().width(), 160);
    }

    #[test]
    fn test_only_newest_waiting_payload_is_decoded() {
        let mut renderer = renderer(&DisplayConfig::default());
        // Inline decode of the first payload completes immediately but is not
        // collected until poll, so the next two wait and the older one is
        // superseded.
        renderer.submit(payload(32, 24, 1));
        renderer.submit(payload(48, 36, 2));
        renderer.submit(payload(64, 48, 3));

        renderer.poll();
        assert_eq!(renderer.shown().unwrap().width(), 32);
        renderer.poll();
        let shown = renderer.shown().unwrap();
        assert_eq!((shown.seq, shown.width()), (2, 64));
        renderer.poll();
        assert_eq!(renderer.shown().unwrap().seq, 2);
    }

    #[test]
    fn test_scaling_is_opt_in() {
        let config = DisplayConfig {
            scale_annotations: true,
            ..DisplayConfig::default()
        };
        let mut renderer = renderer(&config);
        renderer.submit(payload(320, 240, 10));
        renderer.poll();

        let mut canvas = Canvas::new(640, 480);
        renderer.draw(&mut canvas, &[Annotation::new(10.0, 10.0, 50.0, 50.0, true)]);
        assert_eq!(canvas.shapes()[0].rect, Rect { x1: 20.0, y1: 20.0, x2: 100.0, y2: 100.0 });
    }

    #[test]
    fn test_reset_discards_uncollected_decode() {
        let mut renderer = renderer(&DisplayConfig::default());
        renderer.submit(payload(32, 24, 1));
        renderer.submit(payload(48, 36, 2));
        renderer.reset();

        renderer.poll();
        assert!(renderer.shown().is_none());
        let mut canvas = Canvas::new(640, 480);
        assert!(!renderer.draw(&mut canvas, &[]));
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_reset_forgets_frame() {
        let mut renderer = renderer(&DisplayConfig::default());
        renderer.submit(payload(32, 24, 1));
        renderer.poll();
        renderer.reset();
        assert!(renderer.shown().is_none());
        assert!(!renderer.draw(&mut Canvas::new(640, 480), &[]));
    }
}
