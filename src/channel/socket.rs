// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Socket.IO client over WebSocket.
//!
//! One tokio task per [`ChannelSession`]:
//!
//! ```text
//! connect ─▶ engine.io open ─▶ socket.io connect ─▶ session loop
//!    ▲              (bounded by connect_timeout)        │
//!    └──── reconnection delay ◀── transport lost ───────┘
//! ```
//!
//! Failed attempts are counted; after `1 + reconnection_attempts` consecutive
//! failures the task reports [`ChannelEvent::Failed`] and exits. A server-side
//! namespace disconnect or a rejected connect ends the task without retrying.

use super::protocol::{self, EnginePacket, Handshake, Inbound, SocketPacket};
use super::{ChannelEvent, ChannelSession, Connector};
use crate::config::ChannelConfig;
use crate::error::ConnectionError;
use crate::models::frame::Frame;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawns Socket.IO client tasks on a tokio runtime.
pub struct SocketConnector {
    config: ChannelConfig,
    runtime: tokio::runtime::Handle,
}

impl SocketConnector {
    pub fn new(config: ChannelConfig, runtime: tokio::runtime::Handle) -> Self {
        Self { config, runtime }
    }
}

impl Connector for SocketConnector {
    fn connect(&mut self) -> ChannelSession {
        let (out_tx, out_rx) = unbounded_channel();
        let (ev_tx, ev_rx) = unbounded_channel();
        let shutdown = CancellationToken::new();

        self.runtime.spawn(run_client(
            self.config.clone(),
            out_rx,
            ev_tx,
            shutdown.clone(),
        ));

        ChannelSession::new(out_tx, ev_rx, shutdown)
    }
}

/// Build the WebSocket URL for an analyzer base URL such as
/// `http://localhost:5000`.
pub fn socketio_url(endpoint: &str) -> Result<String, ConnectionError> {
    let invalid = |reason: String| ConnectionError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a websocket scheme".to_owned()))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url.into())
}

/// Why a connected session ended.
#[derive(Debug, PartialEq)]
enum SessionEnd {
    /// The owner closed the session.
    Shutdown,
    /// The server disconnected our namespace; do not reconnect.
    ServerDisconnect,
    /// Transport failure or ping timeout; reconnect.
    Lost(String),
}

struct Connection {
    ws: WsStream,
    handshake: Handshake,
}

fn emit(events: &UnboundedSender<ChannelEvent>, event: ChannelEvent) {
    // The session owner may already be gone; nothing left to tell.
    let _ = events.send(event);
}

async fn run_client(
    config: ChannelConfig,
    mut outbound: UnboundedReceiver<Frame>,
    events: UnboundedSender<ChannelEvent>,
    shutdown: CancellationToken,
) {
    let url = match socketio_url(&config.endpoint) {
        Ok(url) => url,
        Err(e) => {
            log::error!("{}", e);
            emit(&events, ChannelEvent::Failed(e));
            return;
        }
    };

    let max_attempts = config.reconnection_attempts.saturating_add(1);
    let mut failures = 0u32;

    loop {
        let attempt = failures + 1;
        log::info!("Connecting to {} (attempt {}/{})", url, attempt, max_attempts);
        emit(&events, ChannelEvent::Connecting { attempt });

        let opened = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = tokio::time::timeout(config.connect_timeout(), open(&url)) => {
                result.unwrap_or_else(|_| Err(ConnectionError::Handshake("timed out".to_owned())))
            }
        };

        match opened {
            Ok(connection) => {
                failures = 0;
                let dropped = discard_pending(&mut outbound);
                if dropped > 0 {
                    log::debug!("Discarded {} frames queued while disconnected", dropped);
                }
                log::info!("Connected to {} (sid {})", config.endpoint, connection.handshake.sid);
                emit(&events, ChannelEvent::Connected);

                match run_session(connection, &mut outbound, &events, &shutdown).await {
                    SessionEnd::Shutdown => {
                        log::info!("Channel closed");
                        return;
                    }
                    SessionEnd::ServerDisconnect => {
                        log::warn!("Server disconnected the session");
                        emit(
                            &events,
                            ChannelEvent::Disconnected {
                                reason: "io server disconnect".to_owned(),
                                reconnecting: false,
                            },
                        );
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        log::warn!("Disconnected from server: {}", reason);
                        emit(
                            &events,
                            ChannelEvent::Disconnected {
                                reason,
                                reconnecting: true,
                            },
                        );
                    }
                }
            }
            Err(ConnectionError::Rejected(message)) => {
                log::error!("Connection rejected: {}", message);
                emit(
                    &events,
                    ChannelEvent::ConnectError {
                        message: message.clone(),
                        attempt,
                    },
                );
                emit(&events, ChannelEvent::Failed(ConnectionError::Rejected(message)));
                return;
            }
            Err(e) => {
                failures += 1;
                let message = e.to_string();
                log::error!("Connection error: {}", message);
                emit(
                    &events,
                    ChannelEvent::ConnectError {
                        message: message.clone(),
                        attempt,
                    },
                );
                if failures >= max_attempts {
                    emit(
                        &events,
                        ChannelEvent::Failed(ConnectionError::AttemptsExhausted {
                            attempts: failures,
                            last_error: message,
                        }),
                    );
                    return;
                }
            }
        }

        let delay = config.reconnection_delay(failures.max(1));
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn discard_pending(outbound: &mut UnboundedReceiver<Frame>) -> usize {
    let mut dropped = 0;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

/// WebSocket connect plus the Engine.IO and Socket.IO handshakes.
async fn open(url: &str) -> Result<Connection, ConnectionError> {
    let (mut ws, _response) = connect_async(url)
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;

    let handshake = loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Open(handshake) => break handshake,
            other => log::debug!("Ignoring {:?} before engine.io open", other),
        }
    };
    log::debug!(
        "engine.io open: ping {}ms + {}ms, max payload {:?}, upgrades {:?}",
        handshake.ping_interval,
        handshake.ping_timeout,
        handshake.max_payload,
        handshake.upgrades
    );

    ws.send(Message::Text(protocol::encode_connect()))
        .await
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;

    loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                Ok(SocketPacket::Connect { namespace, .. }) if namespace == "/" => break,
                Ok(SocketPacket::ConnectError { data, .. }) => {
                    let message = data
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_owned)
                        .unwrap_or_else(|| data.to_string());
                    return Err(ConnectionError::Rejected(message));
                }
                Ok(other) => log::debug!("Ignoring {:?} during socket.io connect", other),
                Err(e) => return Err(ConnectionError::Handshake(e.to_string())),
            },
            EnginePacket::Ping(data) => {
                ws.send(Message::Text(EnginePacket::Pong(data).encode()))
                    .await
                    .map_err(|e| ConnectionError::Transport(e.to_string()))?;
            }
            EnginePacket::Close => {
                return Err(ConnectionError::Handshake("closed during connect".to_owned()))
            }
            _ => {}
        }
    }

    Ok(Connection { ws, handshake })
}

/// Next Engine.IO packet during the handshake.
async fn next_packet(ws: &mut WsStream) -> Result<EnginePacket, ConnectionError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return EnginePacket::decode(&text)
                    .map_err(|e| ConnectionError::Handshake(e.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ConnectionError::Transport("connection closed".to_owned()))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ConnectionError::Transport(e.to_string())),
        }
    }
}

async fn run_session(
    connection: Connection,
    outbound: &mut UnboundedReceiver<Frame>,
    events: &UnboundedSender<ChannelEvent>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let window = connection.handshake.liveness_window();
    let max_payload = connection.handshake.max_payload;
    let (mut sink, mut stream) = connection.ws.split();
    let mut deadline = Instant::now() + window;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Text(EnginePacket::Message("1".to_owned()).encode())).await;
                let _ = sink.close().await;
                return SessionEnd::Shutdown;
            }
            _ = tokio::time::sleep_until(deadline) => {
                return SessionEnd::Lost("ping timeout".to_owned());
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                };
                let text = protocol::encode_frame_event(&frame.payload);
                // The server closes the transport on oversized packets.
                if let Some(limit) = max_payload.filter(|&limit| text.len() as u64 > limit) {
                    log::warn!("Dropping frame of {} bytes, server limit is {}", text.len(), limit);
                    continue;
                }
                if let Err(e) = sink.send(Message::Text(text)).await {
                    return SessionEnd::Lost(format!("transport error: {e}"));
                }
                log::trace!("Sent frame captured {:?} ago", frame.captured_at.elapsed());
            }
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        log::debug!("Server closed websocket: {:?}", frame);
                        return SessionEnd::Lost("transport close".to_owned());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Lost(format!("transport error: {e}")),
                    None => return SessionEnd::Lost("transport close".to_owned()),
                };
                deadline = Instant::now() + window;

                match EnginePacket::decode(&text) {
                    Ok(EnginePacket::Ping(data)) => {
                        if let Err(e) = sink.send(Message::Text(EnginePacket::Pong(data).encode())).await {
                            return SessionEnd::Lost(format!("transport error: {e}"));
                        }
                    }
                    Ok(EnginePacket::Close) => return SessionEnd::Lost("transport close".to_owned()),
                    Ok(EnginePacket::Message(body)) => {
                        if let Some(end) = handle_message(&body, events) {
                            return end;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Dropping malformed engine.io packet: {}", e),
                }
            }
        }
    }
}

/// Dispatch one Socket.IO packet. Returns `Some` if the session must end.
fn handle_message(body: &str, events: &UnboundedSender<ChannelEvent>) -> Option<SessionEnd> {
    match SocketPacket::decode(body) {
        Ok(SocketPacket::Event {
            namespace, name, args, ..
        }) if namespace == "/" => match protocol::interpret_event(&name, args) {
            Ok(Some(Inbound::ProcessedFrame(payload))) => {
                emit(events, ChannelEvent::ProcessedFrame(payload));
            }
            Ok(Some(Inbound::Annotations(annotations))) => {
                log::debug!("Received {} annotations", annotations.len());
                emit(events, ChannelEvent::Annotations(annotations));
            }
            Ok(None) => log::debug!("Ignoring unhandled event {:?}", name),
            Err(e) => log::warn!("Dropping malformed {:?} event: {}", name, e),
        },
        Ok(SocketPacket::Disconnect { namespace }) if namespace == "/" => {
            return Some(SessionEnd::ServerDisconnect);
        }
        Ok(other) => log::debug!("Ignoring {:?}", other),
        Err(e) => log::warn!("Dropping malformed socket.io packet: {}", e),
    }
    None
}
