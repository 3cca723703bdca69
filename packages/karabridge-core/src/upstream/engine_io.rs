//! Engine.IO v4 / Socket.IO v5 packet framing for WebSocket transport.
//!
//! Only the subset the bridge needs is supported: the default namespace,
//! text frames, and events without acknowledgements.
//!
//! | Frame          | Meaning                         |
//! |----------------|---------------------------------|
//! | `0{...}`       | Engine.IO open (handshake data) |
//! | `1`            | Engine.IO close                 |
//! | `2` / `3`      | ping / pong                     |
//! | `40{...}`      | namespace connected             |
//! | `41`           | namespace disconnected          |
//! | `42[name,...]` | event                           |
//! | `44{...}`      | namespace connect error         |

use serde_json::Value;

use super::{UpstreamError, UpstreamResult};

/// Client frame answering a server ping.
pub const PONG: &str = "3";

/// Client frame requesting the default namespace.
pub const CONNECT: &str = "40";

/// Client frame leaving the default namespace.
pub const DISCONNECT: &str = "41";

/// Decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Handshake data (`sid`, `pingInterval`, ...).
    Open(Value),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

/// Decoded Socket.IO packet carried in an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(Value),
    /// Acks and binary packets, which the bridge never requests.
    Unsupported(char),
}

/// Decodes one WebSocket text frame.
pub fn decode(frame: &str) -> UpstreamResult<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| UpstreamError::Protocol("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| UpstreamError::Protocol(format!("bad open packet: {}", e))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '6' => Ok(EnginePacket::Noop),
        other => Err(UpstreamError::Protocol(format!(
            "unknown engine packet type {:?}",
            other
        ))),
    }
}

fn decode_socket(frame: &str) -> UpstreamResult<SocketPacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| UpstreamError::Protocol("empty socket packet".into()))?;
    let body = skip_namespace(chars.as_str());

    match kind {
        '0' => Ok(SocketPacket::Connect),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => decode_event(body),
        '4' => Ok(SocketPacket::ConnectError(
            serde_json::from_str(body).unwrap_or(Value::Null),
        )),
        other => Ok(SocketPacket::Unsupported(other)),
    }
}

/// Strips a `/namespace,` prefix if present.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn decode_event(body: &str) -> UpstreamResult<SocketPacket> {
    // An ack id, if any, precedes the JSON array.
    let json = body.trim_start_matches(|c: char| c.is_ascii_digit());
    let mut items: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| UpstreamError::Protocol(format!("bad event payload: {}", e)))?;
    if items.is_empty() {
        return Err(UpstreamError::Protocol("event without a name".into()));
    }
    match items.remove(0) {
        Value::String(name) => Ok(SocketPacket::Event { name, args: items }),
        other => Err(UpstreamError::Protocol(format!(
            "event name is not a string: {}",
            other
        ))),
    }
}

/// Encodes an event for the default namespace.
pub fn encode_event(name: &str, args: Vec<Value>) -> String {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::String(name.to_string()));
    items.extend(args);
    format!("42{}", Value::Array(items))
}
