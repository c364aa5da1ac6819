//! Engine.IO v4 / Socket.IO v5 text-frame codec.
//!
//! # Design
//! Only the WebSocket transport is spoken, so every frame is one Engine.IO
//! packet. Message packets (`4`) carry a Socket.IO packet:
//!
//! ```text
//! <type>[<attachments>-][<namespace>,][<ack id>][<json>]
//! 42["bi:kpi-update",{...}]        event on the default namespace
//! 42/admin,7["ping"]               event on /admin with ack id 7
//! 44{"message":"unauthorized"}     connect error
//! ```
//!
//! Binary attachments are rejected; the admin streams are JSON only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

pub const DEFAULT_NAMESPACE: &str = "/";

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
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
        name: String,
        args: Vec<Value>,
        ack: Option<u64>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

impl SocketPacket {
    /// An event on the default namespace with a single payload argument.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: name.into(),
            args: vec![payload],
            ack: None,
        }
    }

    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Whether the packet belongs to the namespace the streams connect to.
    pub fn in_default_namespace(&self) -> bool {
        self.namespace() == DEFAULT_NAMESPACE
    }
}

impl EnginePacket {
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(hs) => {
                format!("0{}", serde_json::to_string(hs).unwrap_or_else(|_| "{}".to_string()))
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", encode_socket(packet)),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => serde_json::from_str(rest)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::Malformed(format!("open handshake: {e}"))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping),
            '3' => Ok(EnginePacket::Pong),
            '4' => decode_socket(rest).map(EnginePacket::Message),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnknownEnginePacket(other)),
        }
    }
}

fn encode_socket(packet: &SocketPacket) -> String {
    let (kind, namespace, ack, data) = match packet {
        SocketPacket::Connect { namespace, data } => ('0', namespace, None, data.clone()),
        SocketPacket::Disconnect { namespace } => ('1', namespace, None, None),
        SocketPacket::Event {
            namespace,
            name,
            args,
            ack,
        } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            ('2', namespace, *ack, Some(Value::Array(items)))
        }
        SocketPacket::Ack { namespace, id, args } => {
            ('3', namespace, Some(*id), Some(Value::Array(args.clone())))
        }
        SocketPacket::ConnectError { namespace, message } => (
            '4',
            namespace,
            None,
            Some(serde_json::json!({ "message": message })),
        ),
    };
    let mut out = String::new();
    out.push(kind);
    if namespace != DEFAULT_NAMESPACE && !namespace.is_empty() {
        out.push_str(namespace);
        out.push(',');
    }
    if let Some(id) = ack {
        out.push_str(&id.to_string());
    }
    if let Some(data) = data {
        out.push_str(&data.to_string());
    }
    out
}

fn decode_socket(input: &str) -> Result<SocketPacket, ProtocolError> {
    let mut chars = input.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(ProtocolError::BinaryUnsupported);
    }

    let namespace = if rest.starts_with('/') {
        let end = rest.find(',').unwrap_or(rest.len());
        let ns = rest[..end].to_string();
        rest = rest.get(end + 1..).unwrap_or("");
        ns
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ack = if digits > 0 {
        let id = rest[..digits]
            .parse::<u64>()
            .map_err(|e| ProtocolError::Malformed(format!("ack id: {e}")))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let data = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|e| ProtocolError::Malformed(format!("payload: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let Some(Value::Array(mut items)) = data else {
                return Err(ProtocolError::Malformed("event payload is not an array".into()));
            };
            if items.is_empty() {
                return Err(ProtocolError::Malformed("event without a name".into()));
            }
            let Value::String(name) = items.remove(0) else {
                return Err(ProtocolError::Malformed("event name is not a string".into()));
            };
            Ok(SocketPacket::Event {
                namespace,
                name,
                args: items,
                ack,
            })
        }
        '3' => {
            let id = ack.ok_or_else(|| ProtocolError::Malformed("ack without id".into()))?;
            let args = match data {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            Ok(SocketPacket::Ack { namespace, id, args })
        }
        '4' => {
            let message = match data {
                Some(Value::Object(map)) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connection refused")
                    .to_string(),
                Some(Value::String(s)) => s,
                _ => "connection refused".to_string(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        other => Err(ProtocolError::UnknownSocketPacket(other)),
    }
}
