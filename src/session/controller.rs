// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Session lifecycle.
//!
//! ```text
//! Idle ──start──▶ Starting ──device ok──▶ Running ──stop──▶ Stopping ──▶ Idle
//!                    │                       │
//!                    └──device error──▶ Idle └──channel lost/failed──▶ Idle
//! ```
//!
//! The controller owns the capture device, the channel session, the sampler,
//! the renderer, the annotation store and the canvas. It is driven from the
//! UI thread by [`Controller::tick`]. The device is held exactly while the
//! state is `Running`.

use crate::capture::{CaptureSource, DeviceHandle};
use crate::channel::{ChannelEvent, ChannelSession, ChannelState, Connector};
use crate::config::Config;
use crate::error::{ConnectionError, DeviceError};
use crate::session::encoder::FrameSampler;
use crate::session::render::Renderer;
use crate::session::store::AnnotationStore;
use crate::ui::canvas::Canvas;
use crate::util::job::Dispatch;
use std::collections::VecDeque;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// User-facing notifications, drained by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Started { device: String },
    Stopped,
    StartFailed(DeviceError),
    ChannelConnected,
    /// The connection dropped; capture was stopped if it was running.
    ChannelLost(String),
    /// The channel gave up for good. The next start opens a new one.
    ChannelFailed(ConnectionError),
}

pub struct Controller {
    state: ControllerState,
    source: Box<dyn CaptureSource>,
    connector: Box<dyn Connector>,
    device: Option<Box<dyn DeviceHandle>>,
    channel: Option<ChannelSession>,
    sampler: FrameSampler,
    renderer: Renderer,
    store: AnnotationStore,
    canvas: Canvas,
    notices: VecDeque<Notice>,
}

impl Controller {
    pub fn new(
        config: &Config,
        source: Box<dyn CaptureSource>,
        connector: Box<dyn Connector>,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            state: ControllerState::Idle,
            source,
            connector,
            device: None,
            channel: None,
            sampler: FrameSampler::new(&config.encoder, dispatch),
            renderer: Renderer::new(&config.display, dispatch),
            store: AnnotationStore::new(),
            canvas: Canvas::new(config.display.width, config.display.height),
            notices: VecDeque::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ControllerState::Running
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel
            .as_ref()
            .map_or(ChannelState::Disconnected, ChannelSession::state)
    }

    pub fn frames_sent(&self) -> u64 {
        self.sampler.frames_sent()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Acquire the camera and begin streaming. Does nothing if already
    /// starting or running.
    pub fn start(&mut self) -> Result<(), DeviceError> {
        if self.state != ControllerState::Idle {
            log::debug!("Start ignored in state {:?}", self.state);
            return Ok(());
        }
        self.state = ControllerState::Starting;

        let device = match self.source.acquire() {
            Ok(device) => device,
            Err(e) => {
                log::error!("Failed to start capture: {}", e);
                self.state = ControllerState::Idle;
                self.notices.push_back(Notice::StartFailed(e.clone()));
                return Err(e);
            }
        };

        self.ensure_channel();
        let label = device.label().to_owned();
        self.device = Some(device);
        self.state = ControllerState::Running;

        log::info!("Capture started on {}", label);
        self.notices.push_back(Notice::Started { device: label });
        Ok(())
    }

    /// Stop capture and blank the canvas. The channel stays open.
    pub fn stop(&mut self) {
        if self.state == ControllerState::Idle {
            return;
        }
        self.state = ControllerState::Stopping;
        self.teardown();
        self.state = ControllerState::Idle;

        log::info!("Capture stopped");
        self.notices.push_back(Notice::Stopped);
    }

    /// Advance one display frame.
    pub fn tick(&mut self, now: Instant) {
        self.pump_channel();

        if self.state != ControllerState::Running {
            return;
        }
        if let Some(device) = self.device.as_deref_mut() {
            self.sampler.tick(now, device, self.channel.as_ref());
        }
        self.renderer.poll();
        let annotations = self.store.get();
        self.renderer.draw(&mut self.canvas, &annotations);
    }

    fn ensure_channel(&mut self) {
        if self.channel.as_ref().is_some_and(ChannelSession::is_live) {
            return;
        }
        log::debug!("Opening channel");
        self.channel = Some(self.connector.connect());
    }

    fn pump_channel(&mut self) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        let mut events = Vec::new();
        while let Some(event) = channel.try_next_event() {
            events.push(event);
        }
        for event in events {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connecting { attempt } => log::debug!("Connecting (attempt {})", attempt),
            ChannelEvent::Connected => {
                log::info!("Channel connected");
                self.notices.push_back(Notice::ChannelConnected);
            }
            ChannelEvent::Disconnected { reason, reconnecting } => {
                log::warn!("Channel disconnected: {} (reconnecting: {})", reason, reconnecting);
                self.stop_on_channel_loss();
                self.notices.push_back(Notice::ChannelLost(reason));
            }
            ChannelEvent::ConnectError { message, attempt } => {
                log::warn!("Connect attempt {} failed: {}", attempt, message);
                self.stop_on_channel_loss();
                self.notices.push_back(Notice::ChannelLost(message));
            }
            ChannelEvent::Failed(e) => {
                log::error!("Channel failed: {}", e);
                self.stop_on_channel_loss();
                self.notices.push_back(Notice::ChannelFailed(e));
            }
            ChannelEvent::ProcessedFrame(payload) => {
                if self.is_running() {
                    self.renderer.submit(payload);
                } else {
                    log::trace!("Ignoring processed frame while {:?}", self.state);
                }
            }
            ChannelEvent::Annotations(annotations) => {
                if self.is_running() {
                    self.store.set(annotations);
                } else {
                    log::trace!("Ignoring annotations while {:?}", self.state);
                }
            }
        }
    }

    fn stop_on_channel_loss(&mut self) {
        if self.state == ControllerState::Running {
            log::info!("Stopping capture after channel loss");
            self.teardown();
            self.state = ControllerState::Idle;
        }
    }

    // Sampler first, so no encode result lands after the device is gone.
    fn teardown(&mut self) {
        self.sampler.cancel();
        if let Some(mut device) = self.device.take() {
            device.release();
            if !device.is_released() {
                log::warn!("{} still reports active after release", device.label());
            }
        }
        self.store.clear();
        self.renderer.reset();
        self.canvas.clear();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::loopback::{pair, LoopbackConnector, Peer};
    use crate::models::annotation::Annotation;
    use image::RgbImage;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        acquired: u32,
        released: u32,
        active: bool,
        fail: Option<DeviceError>,
    }

    struct ProbeSource(Rc<RefCell<Probe>>);

    impl CaptureSource for ProbeSource {
        fn acquire(&mut self) -> Result<Box<dyn DeviceHandle>, DeviceError> {
            let mut probe = self.0.borrow_mut();
            if let Some(e) = probe.fail.clone() {
                return Err(e);
            }
            assert!(!probe.active, "device acquired twice");
            probe.acquired += 1;
            probe.active = true;
            Ok(Box::new(ProbeHandle {
                probe: Rc::clone(&self.0),
                released: false,
            }))
        }
    }

    struct ProbeHandle {
        probe: Rc<RefCell<Probe>>,
        released: bool,
    }

    impl DeviceHandle for ProbeHandle {
        fn label(&self) -> &str {
            "probe"
        }

        fn grab(&mut self) -> Option<RgbImage> {
            assert!(!self.released, "grab after release");
            Some(RgbImage::new(64, 48))
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                let mut probe = self.probe.borrow_mut();
                probe.released += 1;
                probe.active = false;
            }
        }

        fn is_released(&self) -> bool {
            self.released
        }
    }

    struct Harness {
        controller: Controller,
        probe: Rc<RefCell<Probe>>,
        peers: Vec<Peer>,
        now: Instant,
    }

    impl Harness {
        fn new(sessions: usize) -> Self {
            let probe = Rc::new(RefCell::new(Probe::default()));
            let mut connector = LoopbackConnector::default();
            let mut peers = Vec::new();
            for _ in 0..sessions {
                let (session, peer) = pair();
                connector.sessions.push(session);
                peers.push(peer);
            }
            let controller = Controller::new(
                &Config::default(),
                Box::new(ProbeSource(Rc::clone(&probe))),
                Box::new(connector),
                Dispatch::Inline,
            );
            Self {
                controller,
                probe,
                peers,
                now: Instant::now(),
            }
        }

        fn tick_after(&mut self, millis: u64) {
            self.now += Duration::from_millis(millis);
            self.controller.tick(self.now);
        }

        fn emit(&self, event: ChannelEvent) {
            self.peers[0].emit(event);
        }

        fn device_active(&self) -> bool {
            self.probe.borrow().active
        }

        fn releases(&self) -> u32 {
            self.probe.borrow().released
        }
    }

    fn lost() -> ChannelEvent {
        ChannelEvent::Disconnected {
            reason: "transport close".to_owned(),
            reconnecting: true,
        }
    }

    #[test]
    fn test_start_then_stop() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        assert_eq!(h.controller.state(), ControllerState::Running);
        assert!(h.device_active());

        h.tick_after(0);
        assert_eq!(h.peers[0].received().len(), 1);

        h.controller.stop();
        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert!(!h.device_active());
        assert_eq!(h.releases(), 1);
        assert!(h.controller.canvas().is_blank());
        assert_eq!(
            h.controller.take_notices(),
            vec![Notice::Started { device: "probe".to_owned() }, Notice::Stopped]
        );
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let mut h = Harness::new(1);
        h.controller.stop();
        h.controller.stop();
        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(h.releases(), 0);
        assert!(h.controller.take_notices().is_empty());
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        h.controller.start().unwrap();
        assert_eq!(h.probe.borrow().acquired, 1);
        assert_eq!(h.controller.take_notices().len(), 1);
    }

    #[test]
    fn test_start_failure_leaves_nothing_held() {
        let mut h = Harness::new(1);
        h.probe.borrow_mut().fail = Some(DeviceError::PermissionDenied("denied".to_owned()));

        let err = h.controller.start().unwrap_err();
        assert_eq!(err, DeviceError::PermissionDenied("denied".to_owned()));
        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert!(!h.device_active());
        assert_eq!(h.controller.take_notices(), vec![Notice::StartFailed(err)]);

        // Recovers once the device becomes available.
        h.probe.borrow_mut().fail = None;
        h.controller.start().unwrap();
        assert!(h.device_active());
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Start,
        Stop,
        Lose,
        ToggleDenied,
    }

    #[test]
    fn test_device_held_exactly_while_running() {
        const OPS: [Op; 4] = [Op::Start, Op::Stop, Op::Lose, Op::ToggleDenied];

        for n in 0..OPS.len().pow(4) {
            let mut h = Harness::new(1);
            let mut code = n;
            let mut trace = Vec::new();
            for _ in 0..4 {
                let op = OPS[code % OPS.len()];
                code /= OPS.len();
                trace.push(op);

                match op {
                    Op::Start => {
                        let _ = h.controller.start();
                    }
                    Op::Stop => h.controller.stop(),
                    Op::Lose => h.emit(lost()),
                    Op::ToggleDenied => {
                        let mut probe = h.probe.borrow_mut();
                        probe.fail = match probe.fail {
                            Some(_) => None,
                            None => Some(DeviceError::NoDeviceAvailable("gone".to_owned())),
                        };
                    }
                }
                h.tick_after(16);

                let probe = h.probe.borrow();
                assert_eq!(
                    probe.active,
                    h.controller.is_running(),
                    "after {:?}",
                    trace
                );
                assert_eq!(probe.acquired - probe.released, u32::from(probe.active), "after {:?}", trace);
            }
        }
    }

    #[test]
    fn test_disconnect_while_running_stops_once() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        h.tick_after(0);
        let sent = h.peers[0].received();
        h.emit(ChannelEvent::ProcessedFrame(sent[0].payload.clone()));
        h.tick_after(16);
        assert!(!h.controller.canvas().is_blank());

        h.emit(lost());
        h.emit(ChannelEvent::ConnectError {
            message: "refused".to_owned(),
            attempt: 1,
        });
        h.tick_after(16);

        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(h.releases(), 1);
        assert!(h.controller.canvas().is_blank());
        let notices = h.controller.take_notices();
        assert!(notices.contains(&Notice::ChannelLost("transport close".to_owned())));
        assert!(notices.contains(&Notice::ChannelLost("refused".to_owned())));
    }

    #[test]
    fn test_connect_error_while_running_stops() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        h.emit(ChannelEvent::ConnectError {
            message: "timeout".to_owned(),
            attempt: 2,
        });
        h.tick_after(16);
        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(h.releases(), 1);
        assert!(h.controller.canvas().is_blank());
    }

    #[test]
    fn test_frame_before_annotations_has_no_overlay() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        h.tick_after(0);
        let sent = h.peers[0].received();

        h.emit(ChannelEvent::ProcessedFrame(sent[0].payload.clone()));
        h.tick_after(16);

        let canvas = h.controller.canvas();
        assert!(canvas.image().is_some());
        assert!(canvas.shapes().is_empty());
    }

    #[test]
    fn test_round_trip_draws_frame_and_box() {
        let mut h = Harness::new(1);
        h.emit(ChannelEvent::Connected);
        h.controller.start().unwrap();

        h.tick_after(0);
        let frame_a = h.peers[0].received().remove(0);
        assert!(frame_a.payload.starts_with("data:image/jpeg;base64,"));

        h.emit(ChannelEvent::ProcessedFrame(frame_a.payload));
        h.tick_after(50);
        h.emit(ChannelEvent::Annotations(vec![Annotation::new(0.0, 0.0, 100.0, 100.0, true)]));
        h.tick_after(10);

        let canvas = h.controller.canvas();
        let image = canvas.image().unwrap();
        assert_eq!(image.seq, 0);
        assert_eq!((image.width(), image.height()), (320, 240));

        let shapes = canvas.shapes();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].stroke.color, [0, 255, 0, 255]);
        assert_eq!(shapes[0].stroke.width, 2.0);
        assert_eq!(
            (shapes[0].rect.x1, shapes[0].rect.y1, shapes[0].rect.x2, shapes[0].rect.y2),
            (0.0, 0.0, 100.0, 100.0)
        );
        assert_eq!(h.controller.channel_state(), ChannelState::Connected);
    }

    #[test]
    fn test_inbound_ignored_while_idle() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        h.controller.stop();

        h.emit(ChannelEvent::ProcessedFrame("data:image/jpeg;base64,AAAA".to_owned()));
        h.emit(ChannelEvent::Annotations(vec![Annotation::new(0.0, 0.0, 1.0, 1.0, true)]));
        h.tick_after(16);

        h.controller.start().unwrap();
        h.tick_after(16);
        assert!(h.controller.canvas().is_blank());
    }

    #[test]
    fn test_channel_survives_stop_and_start() {
        let mut h = Harness::new(2);
        h.controller.start().unwrap();
        h.controller.stop();
        h.controller.start().unwrap();
        h.tick_after(0);

        // Still on the first session; the second was never requested.
        assert_eq!(h.peers[0].received().len(), 1);
        assert!(h.peers[1].received().is_empty());
    }

    #[test]
    fn test_failed_channel_is_replaced_on_next_start() {
        let mut h = Harness::new(2);
        h.controller.start().unwrap();
        h.emit(ChannelEvent::Failed(ConnectionError::AttemptsExhausted {
            attempts: 4,
            last_error: "refused".to_owned(),
        }));
        h.tick_after(16);

        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(h.controller.channel_state(), ChannelState::Failed);
        assert!(matches!(
            h.controller.take_notices().last(),
            Some(Notice::ChannelFailed(ConnectionError::AttemptsExhausted { .. }))
        ));

        h.controller.start().unwrap();
        h.tick_after(16);
        assert_eq!(h.peers[1].received().len(), 1);
        assert_eq!(h.controller.frames_sent(), 1);
    }

    #[test]
    fn test_drop_releases_device_and_closes_channel() {
        let mut h = Harness::new(1);
        h.controller.start().unwrap();
        let Harness {
            controller,
            probe,
            peers,
            ..
        } = h;
        drop(controller);
        assert_eq!(probe.borrow().released, 1);
        assert!(peers[0].is_shut_down());
    }
}
