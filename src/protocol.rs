//! Socket.IO (v5) over Engine.IO (v4) framing, websocket transport only.
//!
//! The browser user script speaks stock socket.io-client, so frames follow
//! that format: an Engine.IO packet-type digit, then for `4` (message) a
//! Socket.IO packet-type digit, an optional `/namespace,` and a JSON body.
//!
//! Only the subset this server needs is handled: the open handshake,
//! heartbeats, namespace connect/disconnect and outbound events.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Event name carrying [`CommandMessage`] payloads to the browser.
pub const COMMAND_EVENT: &str = "command_to_browser";

pub const MAX_PAYLOAD: u64 = 1_000_000;

/// Engine.IO heartbeat timings advertised in the open packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Delay between server pings.
    pub interval: Duration,
    /// How long to wait for the pong before giving up on the client.
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(25_000),
            timeout: Duration::from_millis(20_000),
        }
    }
}

/// How long an upgraded socket may sit without joining a namespace.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

/// Engine.IO protocol revision this server implements.
pub const ENGINE_IO_VERSION: &str = "4";

pub const DEFAULT_NAMESPACE: &str = "/";

/// Server heartbeat ping; the client answers with [`PONG`].
pub const PING: &str = "2";
pub const PONG: &str = "3";

/// Payload of a `command_to_browser` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub action: String,
}

impl CommandMessage {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenPayload<'a> {
    sid: &'a str,
    upgrades: [&'a str; 0],
    ping_interval: u64,
    ping_timeout: u64,
    max_payload: u64,
}

#[derive(Serialize)]
struct SidPayload<'a> {
    sid: &'a str,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    message: &'a str,
}

/// Engine.IO `open` packet sent right after the websocket upgrade.
pub fn open_packet(engine_sid: &str, heartbeat: &Heartbeat) -> String {
    let payload = OpenPayload {
        sid: engine_sid,
        upgrades: [],
        ping_interval: heartbeat.interval.as_millis() as u64,
        ping_timeout: heartbeat.timeout.as_millis() as u64,
        max_payload: MAX_PAYLOAD,
    };
    format!("0{}", serde_json::to_string(&payload).unwrap_or_default())
}

/// Acknowledge a namespace connect on the default namespace.
pub fn connect_ack(socket_sid: &str) -> String {
    let payload = SidPayload { sid: socket_sid };
    format!("40{}", serde_json::to_string(&payload).unwrap_or_default())
}

/// Reject a namespace connect.
pub fn connect_error(namespace: &str, message: &str) -> String {
    let body = serde_json::to_string(&ErrorPayload { message }).unwrap_or_default();
    if namespace == DEFAULT_NAMESPACE {
        format!("44{body}")
    } else {
        format!("44{namespace},{body}")
    }
}

/// Encode an event on the default namespace: `42["name",payload]`.
pub fn event_frame<T: Serialize>(name: &str, payload: &T) -> Result<String, serde_json::Error> {
    let body = serde_json::to_string(&(name, payload))?;
    Ok(format!("42{body}"))
}

/// Encode a `command_to_browser` event.
pub fn command_frame(message: &CommandMessage) -> Result<String, serde_json::Error> {
    event_frame(COMMAND_EVENT, message)
}

/// A decoded frame received from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    /// Engine.IO close.
    Close,
    /// Client-initiated ping; answered with a pong.
    Ping,
    Pong,
    Connect { namespace: String },
    Disconnect { namespace: String },
    /// Events, acks and anything else a client may send. Not acted upon.
    Other,
    Malformed,
}

/// Decode one text frame from a client.
pub fn parse_client_packet(text: &str) -> ClientPacket {
    let mut chars = text.chars();
    match chars.next() {
        Some('1') => ClientPacket::Close,
        Some('2') => ClientPacket::Ping,
        Some('3') => ClientPacket::Pong,
        Some('4') => parse_socket_packet(chars.as_str()),
        Some('5') | Some('6') => ClientPacket::Other,
        _ => ClientPacket::Malformed,
    }
}

fn parse_socket_packet(body: &str) -> ClientPacket {
    let mut chars = body.chars();
    let kind = match chars.next() {
        Some(c) => c,
        None => return ClientPacket::Malformed,
    };
    let rest = chars.as_str();
    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(end) => rest[..end].to_string(),
            None => rest.to_string(),
        }
    } else {
        DEFAULT_NAMESPACE.to_string()
    };
    match kind {
        '0' => ClientPacket::Connect { namespace },
        '1' => ClientPacket::Disconnect { namespace },
        '2'..='6' => ClientPacket::Other,
        _ => ClientPacket::Malformed,
    }
}

/// Reasons a handshake request is refused before the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("Transport unknown")]
    TransportUnknown,
    #[error("Bad request")]
    BadRequest,
    #[error("Unsupported protocol version")]
    UnsupportedProtocolVersion,
}

impl HandshakeError {
    /// Numeric code used in Engine.IO error bodies.
    pub fn code(&self) -> u8 {
        match self {
            HandshakeError::TransportUnknown => 0,
            HandshakeError::BadRequest => 3,
            HandshakeError::UnsupportedProtocolVersion => 5,
        }
    }
}

/// Check the `EIO` and `transport` query parameters of a handshake.
pub fn validate_handshake(query: &HashMap<String, String>) -> Result<(), HandshakeError> {
    match query.get("transport").map(String::as_str) {
        Some("websocket") => {}
        _ => return Err(HandshakeError::TransportUnknown),
    }
    match query.get("EIO").map(String::as_str) {
        Some(ENGINE_IO_VERSION) => {}
        Some(_) => return Err(HandshakeError::UnsupportedProtocolVersion),
        None => return Err(HandshakeError::BadRequest),
    }
    if query.contains_key("sid") {
        // Upgrades from polling are not offered, so a sid is never valid here.
        return Err(HandshakeError::BadRequest);
    }
    Ok(())
}
