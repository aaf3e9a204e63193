// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Duplex message channel to the remote analyzer.
//!
//! A [`ChannelSession`] is the UI-thread end of one connection lifetime. The
//! network side runs elsewhere (see [`socket`]) and talks to the session only
//! through two unbounded queues:
//!
//! ```text
//! ChannelSession::send ──frames──▶ client task ──42["frame",..]──▶ analyzer
//! ChannelSession::try_next_event ◀──ChannelEvent── client task ◀── analyzer
//! ```
//!
//! Sessions are created by a [`Connector`], which lets the lifecycle
//! controller own and replace its channel explicitly.

use crate::error::ConnectionError;
use crate::models::annotation::Annotation;
use crate::models::frame::Frame;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

pub mod protocol;
pub mod socket;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget exhausted or connection refused; terminal.
    Failed,
}

/// Everything the network side reports to the session owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connecting { attempt: u32 },
    Connected,
    Disconnected { reason: String, reconnecting: bool },
    ConnectError { message: String, attempt: u32 },
    Failed(ConnectionError),
    ProcessedFrame(String),
    Annotations(Vec<Annotation>),
}

/// Creates channel sessions.
pub trait Connector {
    fn connect(&mut self) -> ChannelSession;
}

/// UI-thread end of one connection lifetime.
pub struct ChannelSession {
    outbound: UnboundedSender<Frame>,
    events: UnboundedReceiver<ChannelEvent>,
    state: ChannelState,
    /// The network side has finished and will report nothing further.
    finished: bool,
    shutdown: CancellationToken,
}

impl ChannelSession {
    pub fn new(
        outbound: UnboundedSender<Frame>,
        events: UnboundedReceiver<ChannelEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            events,
            state: ChannelState::Disconnected,
            finished: false,
            shutdown,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether the session can still carry traffic, now or after reconnecting.
    pub fn is_live(&self) -> bool {
        !self.finished && self.state != ChannelState::Failed
    }

    /// Queue a frame for sending. Fire-and-forget; frames queued while the
    /// connection is down are discarded by the network side.
    pub fn send(&self, frame: Frame) {
        if self.outbound.send(frame).is_err() {
            log::debug!("Channel closed, dropping outbound frame");
        }
    }

    /// Next pending event, if any. Never blocks.
    pub fn try_next_event(&mut self) -> Option<ChannelEvent> {
        match self.events.try_recv() {
            Ok(event) => {
                self.observe(&event);
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.finished {
                    log::debug!("Channel event stream ended");
                    self.finished = true;
                }
                None
            }
        }
    }

    #[cfg(test)]
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        let event = self.events.recv().await?;
        self.observe(&event);
        Some(event)
    }

    /// Ask the network side to disconnect and stop reconnecting.
    pub fn close(&mut self) {
        self.shutdown.cancel();
    }

    fn observe(&mut self, event: &ChannelEvent) {
        self.state = match event {
            ChannelEvent::Connecting { .. } => ChannelState::Connecting,
            ChannelEvent::Connected => ChannelState::Connected,
            ChannelEvent::Disconnected { .. } | ChannelEvent::ConnectError { .. } => {
                ChannelState::Disconnected
            }
            ChannelEvent::Failed(_) => ChannelState::Failed,
            ChannelEvent::ProcessedFrame(_) | ChannelEvent::Annotations(_) => self.state,
        };
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// In-process stand-in for the network side, for driving sessions in tests.
#[cfg(test)]
pub mod loopback {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    pub struct Peer {
        events: UnboundedSender<ChannelEvent>,
        outbound: UnboundedReceiver<Frame>,
        shutdown: CancellationToken,
    }

    pub fn pair() -> (ChannelSession, Peer) {
        let (out_tx, out_rx) = unbounded_channel();
        let (ev_tx, ev_rx) = unbounded_channel();
        let shutdown = CancellationToken::new();
        let session = ChannelSession::new(out_tx, ev_rx, shutdown.clone());
        let peer = Peer {
            events: ev_tx,
            outbound: out_rx,
            shutdown,
        };
        (session, peer)
    }

    impl Peer {
        pub fn emit(&self, event: ChannelEvent) {
            let _ = self.events.send(event);
        }

        /// Frames the session has sent since the last call.
        pub fn received(&mut self) -> Vec<Frame> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.outbound.try_recv() {
                frames.push(frame);
            }
            frames
        }

        pub fn is_shut_down(&self) -> bool {
            self.shutdown.is_cancelled()
        }
    }

    /// Hands out pre-built loopback sessions in order.
    #[derive(Default)]
    pub struct LoopbackConnector {
        pub sessions: Vec<ChannelSession>,
    }

    impl Connector for LoopbackConnector {
        fn connect(&mut self) -> ChannelSession {
            if self.sessions.is_empty() {
                // Unscripted session whose peer is already gone.
                pair().0
            } else {
                self.sessions.remove(0)
            }
        }
    }
}
