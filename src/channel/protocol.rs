// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Engine.IO v4 / Socket.IO v5 packet codec (WebSocket transport, text only).
//!
//! Every WebSocket text frame carries one Engine.IO packet: a type digit
//! followed by its payload. Engine.IO `message` packets carry one Socket.IO
//! packet:
//!
//! ```text
//! <type>[/<namespace>,][<ack id>][<json payload>]
//! ```
//!
//! e.g. `42["faces",[[10,10,50,50,0]]]` is an event on the main namespace.
//! Binary attachments are not supported.

use crate::error::ProtocolError;
use crate::models::annotation::{parse_annotation_set, Annotation};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const EVENT_FRAME: &str = "frame";
pub const EVENT_CAMERA_FRAME: &str = "camera-frame";
pub const EVENT_FACES: &str = "faces";

const MAIN_NAMESPACE: &str = "/";

/// Server handshake carried by the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the server may stay silent before the connection is
    /// considered dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(body)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(body.to_owned()),
            '3' => EnginePacket::Pong(body.to_owned()),
            '4' => EnginePacket::Message(body.to_owned()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => {
                return Err(ProtocolError::UnknownType {
                    layer: "engine.io",
                    kind: other,
                })
            }
        })
    }

    /// Encode a client-side packet. `Open` is server-only and encodes as an
    /// empty open.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_owned(),
            EnginePacket::Close => "1".to_owned(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_owned(),
            EnginePacket::Noop => "6".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl SocketPacket {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::Unsupported("binary packets"));
        }
        let mut rest = chars.as_str();

        let namespace = match rest.strip_prefix('/') {
            Some(_) => {
                let end = rest.find(',').unwrap_or(rest.len());
                let namespace = rest[..end].to_owned();
                rest = rest.get(end + 1..).unwrap_or("");
                namespace
            }
            None => MAIN_NAMESPACE.to_owned(),
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack = if digits > 0 {
            rest[..digits].parse::<u64>().ok()
        } else {
            None
        };
        rest = &rest[digits..];

        let payload = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect {
                namespace,
                data: payload,
            }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = payload else {
                    return Err(ProtocolError::Event("event payload must be an array"));
                };
                if items.is_empty() {
                    return Err(ProtocolError::Event("event payload has no name"));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(ProtocolError::Event("event name must be a string"));
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack,
                    name,
                    args: items,
                })
            }
            '3' => {
                let id = ack.ok_or(ProtocolError::Event("ack without id"))?;
                let args = match payload {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                Ok(SocketPacket::Ack { namespace, id, args })
            }
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: payload.unwrap_or(Value::Null),
            }),
            other => Err(ProtocolError::UnknownType {
                layer: "socket.io",
                kind: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        fn prefix(kind: char, namespace: &str) -> String {
            if namespace == MAIN_NAMESPACE {
                kind.to_string()
            } else {
                format!("{kind}{namespace},")
            }
        }

        match self {
            SocketPacket::Connect { namespace, data } => {
                let mut out = prefix('0', namespace);
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
            SocketPacket::Disconnect { namespace } => prefix('1', namespace),
            SocketPacket::Event {
                namespace,
                ack,
                name,
                args,
            } => {
                let mut out = prefix('2', namespace);
                if let Some(id) = ack {
                    out.push_str(&id.to_string());
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&Value::Array(items).to_string());
                out
            }
            SocketPacket::Ack { namespace, id, args } => {
                let mut out = prefix('3', namespace);
                out.push_str(&id.to_string());
                out.push_str(&Value::Array(args.clone()).to_string());
                out
            }
            SocketPacket::ConnectError { namespace, data } => {
                let mut out = prefix('4', namespace);
                out.push_str(&data.to_string());
                out
            }
        }
    }
}

/// Application-level meaning of an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    ProcessedFrame(String),
    Annotations(Vec<Annotation>),
}

/// Interpret an inbound Socket.IO event. Returns `Ok(None)` for events this
/// client does not handle.
pub fn interpret_event(name: &str, args: Vec<Value>) -> Result<Option<Inbound>, ProtocolError> {
    let mut args = args.into_iter();
    match name {
        EVENT_CAMERA_FRAME => match args.next() {
            Some(Value::String(payload)) => Ok(Some(Inbound::ProcessedFrame(payload))),
            _ => Err(ProtocolError::Event("camera-frame payload must be a string")),
        },
        EVENT_FACES => {
            let value = args.next().unwrap_or(Value::Array(Vec::new()));
            Ok(Some(Inbound::Annotations(parse_annotation_set(value)?)))
        }
        _ => Ok(None),
    }
}

/// Full WebSocket text for an outbound `frame` event on the main namespace.
pub fn encode_frame_event(payload: &str) -> String {
    // Avoids cloning the (large) payload into a `Value`.
    let body = serde_json::to_string(&(EVENT_FRAME, payload)).unwrap_or_default();
    format!("42{body}")
}

/// Full WebSocket text for the main-namespace connect request.
pub fn encode_connect() -> String {
    EnginePacket::Message(
        SocketPacket::Connect {
            namespace: MAIN_NAMESPACE.to_owned(),
            data: None,
        }
        .encode(),
    )
    .encode()
}
