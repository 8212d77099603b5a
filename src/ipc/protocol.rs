use crate::error::{ProtocolContext, RelayError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// IPC opcodes
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = RelayError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            _ => {
                let context = ProtocolContext {
                    expected_opcode: None,
                    received_opcode: Some(value),
                    payload_size: None,
                };
                Err(RelayError::protocol_violation(
                    format!("Invalid opcode value: {}", value),
                    context,
                ))
            }
        }
    }
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> Self {
        opcode as u32
    }
}

/// Commands a client can carry in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Dispatch,
    SetActivity,
    Subscribe,
    Unsubscribe,
    InviteBrowser,
    GuildTemplateBrowser,
    DeepLink,
    ConnectionsCallback,
}

impl Command {
    /// Look up a command by its wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        serde_json::from_value(Value::String(name.to_string())).ok()
    }
}

/// A command frame sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub cmd: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub nonce: Value,
}

/// A frame sent back to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpcResponse {
    pub cmd: String,
    pub data: Value,
    pub evt: Option<String>,
    pub nonce: Value,
}

impl IpcResponse {
    /// Acknowledge `request` with `data`
    pub fn reply(request: &IpcRequest, data: Value) -> Self {
        Self {
            cmd: request.cmd.clone(),
            data,
            evt: None,
            nonce: request.nonce.clone(),
        }
    }

    /// Reject `request` with an `ERROR` event
    pub fn error(request: &IpcRequest, code: u32, message: impl Into<String>) -> Self {
        Self {
            cmd: request.cmd.clone(),
            data: serde_json::json!({ "code": code, "message": message.into() }),
            evt: Some("ERROR".to_string()),
            nonce: request.nonce.clone(),
        }
    }
}

/// Handshake payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakePayload {
    pub v: u32,
    pub client_id: String,
}

/// Payload of a close frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClosePayload {
    pub code: u32,
    pub message: String,
}

/// Constants of the IPC protocol
pub mod constants {
    /// Protocol version expected in the handshake.
    pub const IPC_VERSION: u32 = 1;

    /// Number of instance slots (`discord-ipc-0` through `discord-ipc-9`).
    ///
    /// Client SDKs scan exactly this range, so binding outside it makes the
    /// relay invisible to them.
    pub const MAX_IPC_SOCKETS: u8 = 10;

    /// Socket / pipe name prefix; the slot number is appended.
    pub const IPC_SOCKET_PREFIX: &str = "discord-ipc-";

    /// Maximum size for IPC payload data (16 MB)
    ///
    /// Typical Rich Presence payloads are less than 1 KB.
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Header size: opcode (u32 LE) followed by payload length (u32 LE).
    pub const IPC_HEADER_SIZE: usize = 8;

    pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
}

/// Close and error codes understood by client SDKs
pub mod codes {
    /// Malformed payload, also used for an empty client id
    pub const INVALID_PAYLOAD: u32 = 4000;
    pub const INVALID_CLIENT_ID: u32 = 4000;
    pub const INVALID_VERSION: u32 = 4004;
}
